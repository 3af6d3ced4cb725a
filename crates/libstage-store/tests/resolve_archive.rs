use libstage_store::{resolve, ResolveOptions, StoreError, TarBundle};
use std::fs;
use std::path::Path;

fn build_archive(path: &Path, entries: &[(&str, &[u8])]) {
    let mut builder = tar::Builder::new(fs::File::create(path).unwrap());
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.finish().unwrap();
}

fn options(parent: &Path) -> ResolveOptions {
    ResolveOptions {
        staging_parent: Some(parent.to_path_buf()),
        ..ResolveOptions::default()
    }
}

#[test]
fn archive_resources_are_staged_byte_for_byte() {
    let work = tempfile::tempdir().unwrap();
    let archive = work.path().join("natives.tar");
    let binary: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    build_archive(
        &archive,
        &[
            ("resources_list.txt", &b"libtbb.so.2\r\n\r\nlibopenvino.so\n"[..]),
            ("libtbb.so.2", binary.as_slice()),
            ("./libopenvino.so", &b"openvino"[..]),
            ("nested/libignored.so", &b"nested"[..]),
        ],
    );

    let bundle = TarBundle::open_archive(&archive).unwrap();
    assert_eq!(
        bundle.names().collect::<Vec<_>>(),
        vec!["libopenvino.so", "libtbb.so.2", "resources_list.txt"]
    );

    let staged = resolve(&bundle, &options(work.path())).unwrap();
    assert_eq!(staged.len(), 2);
    assert_eq!(fs::read(staged.get("libtbb.so.2").unwrap()).unwrap(), binary);
    assert_eq!(
        fs::read(staged.get("libopenvino.so").unwrap()).unwrap(),
        b"openvino"
    );
}

#[test]
fn listed_resources_absent_from_archive_are_skipped() {
    let work = tempfile::tempdir().unwrap();
    let archive = work.path().join("natives.tar");
    build_archive(
        &archive,
        &[
            ("resources_list.txt", &b"libtbb.so\nlibabsent.so\nplugins.xml\n"[..]),
            ("libtbb.so", &b"tbb"[..]),
            ("plugins.xml", &b"<ie/>"[..]),
        ],
    );

    let bundle = TarBundle::open_archive(&archive).unwrap();
    let staged = resolve(&bundle, &options(work.path())).unwrap();
    assert_eq!(staged.missing(), ["libabsent.so".to_owned()]);
    assert!(staged.dir().join("plugins.xml").is_file());
    assert!(!staged.dir().join("libabsent.so").exists());
}

#[test]
fn truncated_archive_is_a_bundle_error() {
    let work = tempfile::tempdir().unwrap();
    let archive = work.path().join("broken.tar");
    fs::write(&archive, vec![0xffu8; 700]).unwrap();

    assert!(matches!(
        TarBundle::open_archive(&archive),
        Err(StoreError::Bundle(_) | StoreError::Io(_))
    ));
}

#[test]
fn missing_archive_is_an_io_error() {
    let work = tempfile::tempdir().unwrap();
    assert!(matches!(
        TarBundle::open_archive(work.path().join("absent.tar")),
        Err(StoreError::Io(_))
    ));
}
