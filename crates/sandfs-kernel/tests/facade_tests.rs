//! Facade operation contracts over the memory backend.

use std::sync::Arc;

use rstest::rstest;
use sandfs_kernel::types::{EntryKind, MODE_DIR, MODE_FILE, STAT_INO};
use sandfs_kernel::{
    Encoding, ErrorKind, FileData, FsConfig, FsError, MemoryStorage, MkdirOptions, ReadOptions,
    RmdirOptions, SandFs, UnlinkOptions, WriteOptions,
};

async fn write(fs: &SandFs, path: &str, data: &str) {
    fs.write_file(path, data, WriteOptions::recursive())
        .await
        .unwrap();
}

async fn read_text(fs: &SandFs, path: &str) -> String {
    match fs.read_file(path, ReadOptions::utf8()).await.unwrap() {
        FileData::Text(text) => text,
        FileData::Bytes(bytes) => panic!("expected text, got {} bytes", bytes.len()),
    }
}

// ============================================================================
// mkdir / rmdir / readdir
// ============================================================================

#[tokio::test]
async fn mkdir_recursive_is_idempotent() {
    let fs = SandFs::memory();
    fs.mkdir("/a/b/c", MkdirOptions::recursive()).await.unwrap();
    fs.mkdir("/a/b/c", MkdirOptions::recursive()).await.unwrap();
    fs.mkdir("/a/b/c/", MkdirOptions::recursive()).await.unwrap();

    assert!(fs.is_directory("/a/b/c").await);
    assert_eq!(fs.readdir("/a/b").await.unwrap(), vec!["c"]);
}

#[tokio::test]
async fn mkdir_without_recursive_rejects_existing_directory() {
    let fs = SandFs::memory();
    fs.mkdir("/d", MkdirOptions::default()).await.unwrap();
    let err = fs.mkdir("/d", MkdirOptions::default()).await.unwrap_err();
    assert_eq!(err, FsError::already_exists("/d"));
    assert_eq!(err.to_string(), "EEXIST: /d");
}

#[tokio::test]
async fn mkdir_over_a_file_is_eexist_even_recursive() {
    let fs = SandFs::memory();
    write(&fs, "/f", "x").await;
    let err = fs.mkdir("/f", MkdirOptions::recursive()).await.unwrap_err();
    assert!(err.is(ErrorKind::AlreadyExists));
}

#[tokio::test]
async fn mkdir_checks_the_parent() {
    let fs = SandFs::memory();
    let err = fs.mkdir("/missing/d", MkdirOptions::default()).await.unwrap_err();
    assert_eq!(err, FsError::not_found("/missing"));

    write(&fs, "/file", "x").await;
    let err = fs.mkdir("/file/d", MkdirOptions::default()).await.unwrap_err();
    assert_eq!(err, FsError::not_a_directory("/file"));
}

#[tokio::test]
async fn rmdir_not_empty_unless_recursive() {
    let fs = SandFs::memory();
    write(&fs, "/d/inner/f.txt", "x").await;

    let err = fs.rmdir("/d", RmdirOptions::default()).await.unwrap_err();
    assert_eq!(err, FsError::not_empty("/d"));
    assert!(fs.exists("/d/inner/f.txt").await);

    fs.rmdir("/d", RmdirOptions::recursive()).await.unwrap();
    assert!(!fs.exists("/d").await);
}

#[tokio::test]
async fn rmdir_requires_a_directory() {
    let fs = SandFs::memory();
    write(&fs, "/f", "x").await;
    assert!(fs.rmdir("/f", RmdirOptions::default()).await.unwrap_err().is(ErrorKind::NotFound));
    assert!(fs.rmdir("/nope", RmdirOptions::default()).await.unwrap_err().is(ErrorKind::NotFound));
}

#[tokio::test]
async fn readdir_lists_immediate_children_only() {
    let fs = SandFs::memory();
    write(&fs, "/d/a.txt", "a").await;
    write(&fs, "/d/sub/b.txt", "b").await;

    assert_eq!(fs.readdir("/d").await.unwrap(), vec!["a.txt", "sub"]);
    assert_eq!(
        fs.readdir("/d/a.txt").await.unwrap_err(),
        FsError::not_a_directory("/d/a.txt")
    );
    assert_eq!(fs.readdir("/nope").await.unwrap_err(), FsError::not_found("/nope"));
}

// ============================================================================
// write / append / read
// ============================================================================

#[tokio::test]
async fn write_needs_parent_without_recursive() {
    let fs = SandFs::memory();
    let err = fs
        .write_file("/x/y.txt", "data", WriteOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, FsError::not_found("/x"));

    fs.write_file("/x/y.txt", "data", WriteOptions::recursive())
        .await
        .unwrap();
    assert_eq!(read_text(&fs, "/x/y.txt").await, "data");
}

#[tokio::test]
async fn write_onto_directory_is_eisdir() {
    let fs = SandFs::memory();
    fs.mkdir("/d", MkdirOptions::default()).await.unwrap();
    let err = fs.write_file("/d", "x", WriteOptions::default()).await.unwrap_err();
    assert_eq!(err, FsError::is_a_directory("/d"));

    let err = fs.append_file("/d", "x", WriteOptions::default()).await.unwrap_err();
    assert_eq!(err, FsError::is_a_directory("/d"));
}

#[rstest]
#[case::plain(WriteOptions::default())]
#[case::recursive(WriteOptions::recursive())]
#[tokio::test]
async fn write_under_a_file_is_enotdir(#[case] opts: WriteOptions) {
    let fs = SandFs::memory();
    write(&fs, "/plain", "x").await;

    let err = fs.write_file("/plain/a", "y", opts).await.unwrap_err();
    assert_eq!(err, FsError::not_a_directory("/plain"));
    let err = fs.append_file("/plain/a", "y", opts).await.unwrap_err();
    assert_eq!(err, FsError::not_a_directory("/plain"));
    assert_eq!(read_text(&fs, "/plain").await, "x");
}

#[tokio::test]
async fn append_extends_and_creates() {
    let fs = SandFs::memory();
    fs.append_file("/log", "one\n", WriteOptions::default()).await.unwrap();
    fs.append_file("/log", "two\n", WriteOptions::default()).await.unwrap();
    assert_eq!(read_text(&fs, "/log").await, "one\ntwo\n");
}

#[tokio::test]
async fn read_errors() {
    let fs = SandFs::memory();
    fs.mkdir("/d", MkdirOptions::default()).await.unwrap();
    assert_eq!(
        fs.read_file("/d", ReadOptions::default()).await.unwrap_err(),
        FsError::is_a_directory("/d")
    );
    assert_eq!(
        fs.read_file("/missing", ReadOptions::default()).await.unwrap_err(),
        FsError::not_found("/missing")
    );
}

#[rstest]
#[case::utf8(Encoding::Utf8, "héllo wörld")]
#[case::utf16(Encoding::Utf16, "snow ☃ man")]
#[case::ascii(Encoding::Ascii, "plain text")]
#[tokio::test]
async fn text_encodings_round_trip(
    #[case] encoding: Encoding,
    #[case] text: &str,
    #[values(false, true)] base64_always: bool,
) {
    let config = FsConfig {
        base64_always,
        ..FsConfig::default()
    };
    let fs = SandFs::new(Arc::new(MemoryStorage::new()), config);

    fs.write_file("/t", text, WriteOptions::encoding(encoding))
        .await
        .unwrap();
    let back = fs.read_file("/t", ReadOptions::encoding(encoding)).await.unwrap();
    assert_eq!(back, FileData::Text(text.to_string()));
}

#[rstest]
#[tokio::test]
async fn bytes_round_trip(#[values(false, true)] base64_always: bool) {
    let config = FsConfig {
        base64_always,
        ..FsConfig::default()
    };
    let fs = SandFs::new(Arc::new(MemoryStorage::new()), config);
    let bytes = vec![0u8, 1, 159, 255, 10, 13];

    fs.write_file("/bin", bytes.clone(), WriteOptions::default())
        .await
        .unwrap();
    let back = fs.read_file("/bin", ReadOptions::default()).await.unwrap();
    assert_eq!(back, FileData::Bytes(bytes));
    assert_eq!(fs.stat("/bin").await.unwrap().size, 6);
}

#[tokio::test]
async fn base64_text_is_stored_as_bytes() {
    let fs = SandFs::memory();
    fs.write_file("/b", "AP8=", WriteOptions::encoding(Encoding::Base64))
        .await
        .unwrap();

    assert_eq!(
        fs.read_file("/b", ReadOptions::default()).await.unwrap(),
        FileData::Bytes(vec![0, 255])
    );
    assert_eq!(
        fs.read_file("/b", ReadOptions::encoding(Encoding::Base64))
            .await
            .unwrap(),
        FileData::Text("AP8=".into())
    );
}

// ============================================================================
// unlink
// ============================================================================

#[tokio::test]
async fn unlink_files_and_directories() {
    let fs = SandFs::memory();
    write(&fs, "/d/f", "x").await;

    fs.unlink("/d/f", UnlinkOptions::default()).await.unwrap();
    assert!(!fs.exists("/d/f").await);

    write(&fs, "/d/g", "x").await;
    let err = fs.unlink("/d", UnlinkOptions::default()).await.unwrap_err();
    assert_eq!(err, FsError::not_permitted("/d"));
    assert_eq!(err.to_string(), "EPERM: /d");

    fs.unlink("/d", UnlinkOptions::remove_all()).await.unwrap();
    assert!(!fs.exists("/d").await);

    let err = fs.unlink("/gone", UnlinkOptions::default()).await.unwrap_err();
    assert!(err.is(ErrorKind::NotFound));
}

// ============================================================================
// rename / copy tie-break table
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Dest {
    Missing,
    File,
    Dir,
}

async fn setup_transfer(source_is_dir: bool, dest: Dest) -> SandFs {
    let fs = SandFs::memory();
    if source_is_dir {
        write(&fs, "/old/inside.txt", "payload").await;
    } else {
        write(&fs, "/old", "payload").await;
    }
    match dest {
        Dest::Missing => {}
        Dest::File => write(&fs, "/new", "existing").await,
        Dest::Dir => fs.mkdir("/new", MkdirOptions::default()).await.unwrap(),
    }
    fs
}

#[rstest]
#[case::file_to_missing(false, Dest::Missing, None)]
#[case::file_to_file(false, Dest::File, None)]
#[case::file_to_dir(false, Dest::Dir, Some(ErrorKind::IsADirectory))]
#[case::dir_to_missing(true, Dest::Missing, None)]
#[case::dir_to_file(true, Dest::File, None)]
#[case::dir_to_dir(true, Dest::Dir, Some(ErrorKind::AlreadyExists))]
#[tokio::test]
async fn transfer_tie_break(
    #[case] source_is_dir: bool,
    #[case] dest: Dest,
    #[case] expected: Option<ErrorKind>,
    #[values(true, false)] rename: bool,
) {
    let fs = setup_transfer(source_is_dir, dest).await;
    let result = if rename {
        fs.rename("/old", "/new").await
    } else {
        fs.copy("/old", "/new").await
    };

    match expected {
        Some(kind) => {
            let err = result.unwrap_err();
            assert_eq!(err, FsError::new(kind, "/new"));
            assert!(fs.exists("/old").await);
        }
        None => {
            result.unwrap();
            assert_eq!(fs.is_directory("/new").await, source_is_dir);
            assert_eq!(fs.is_file("/new").await, !source_is_dir);
            assert_eq!(fs.exists("/old").await, !rename);
        }
    }
}

#[tokio::test]
async fn transfer_checks_source_then_parent() {
    let fs = SandFs::memory();
    assert_eq!(
        fs.rename("/nope", "/x").await.unwrap_err(),
        FsError::not_found("/nope")
    );

    write(&fs, "/a", "x").await;
    assert_eq!(
        fs.rename("/a", "/no/such/b").await.unwrap_err(),
        FsError::not_found("/no/such")
    );
    write(&fs, "/plain", "x").await;
    assert_eq!(
        fs.copy("/a", "/plain/b").await.unwrap_err(),
        FsError::not_a_directory("/plain")
    );
}

#[tokio::test]
async fn rename_moves_contents() {
    let fs = SandFs::memory();
    write(&fs, "/src/deep/file.txt", "deep").await;
    fs.rename("/src", "/dst").await.unwrap();

    assert_eq!(read_text(&fs, "/dst/deep/file.txt").await, "deep");
    assert!(!fs.exists("/src").await);
}

// ============================================================================
// stat / links / du / uri
// ============================================================================

#[tokio::test]
async fn stat_synthesizes_constants() {
    let fs = SandFs::memory();
    write(&fs, "/f.txt", "12345").await;
    fs.mkdir("/d", MkdirOptions::default()).await.unwrap();

    let file = fs.stat("/f.txt").await.unwrap();
    assert_eq!(file.kind, EntryKind::File);
    assert_eq!(file.mode, MODE_FILE);
    assert_eq!(file.mode, 33206);
    assert_eq!(file.size, 5);
    assert_eq!(file.ino, STAT_INO);
    assert_eq!((file.nlink, file.uid, file.gid, file.dev), (1, 1, 1, 1));

    let dir = fs.lstat("/d").await.unwrap();
    assert!(dir.is_directory());
    assert_eq!(dir.mode, MODE_DIR);
    assert_eq!(dir.mode, 16822);

    assert_eq!(fs.stat("/nope").await.unwrap_err(), FsError::not_found("/nope"));
    assert!(!fs.exists("/nope").await);
    assert!(!fs.is_file("/nope").await);
}

#[tokio::test]
async fn symlinks_are_marker_files() {
    let fs = SandFs::memory();
    write(&fs, "/real/data.txt", "data").await;
    fs.symlink("/shortcut", "/real/data.txt").await.unwrap();

    assert!(fs.is_symbolic_link("/shortcut.lnk").await);
    assert_eq!(fs.stat("/shortcut.lnk").await.unwrap().mode, MODE_DIR);
    assert_eq!(fs.readlink("/shortcut").await.unwrap(), "/real/data.txt");
    assert_eq!(fs.readlink("/shortcut.lnk").await.unwrap(), "/real/data.txt");
    assert_eq!(fs.lstat("/shortcut.lnk").await.unwrap(), fs.stat("/shortcut.lnk").await.unwrap());
}

#[tokio::test]
async fn du_sums_files() {
    let fs = SandFs::memory();
    write(&fs, "/d/a", "123").await;
    write(&fs, "/d/sub/b", "4567").await;

    assert_eq!(fs.du("/d/a").await.unwrap(), 3);
    assert_eq!(fs.du("/d").await.unwrap(), 7);
    assert!(fs.du("/missing").await.unwrap_err().is(ErrorKind::NotFound));
}

#[tokio::test]
async fn get_uri_strips_scheme_and_escapes() {
    let fs = SandFs::memory();
    write(&fs, "/my docs/a b.txt", "x").await;

    assert_eq!(fs.get_uri("/my docs/a b.txt").await.unwrap(), "/my docs/a b.txt");
    assert_eq!(
        fs.get_uri("/missing").await.unwrap_err(),
        FsError::not_found("/missing")
    );
}

// ============================================================================
// lifecycle
// ============================================================================

#[tokio::test]
async fn clear_empties_the_root() {
    let fs = SandFs::memory();
    write(&fs, "/a/b/c", "x").await;
    write(&fs, "/top.txt", "x").await;

    fs.clear().await;
    assert!(fs.readdir("/").await.unwrap().is_empty());
    assert!(fs.is_directory("/").await);
}

#[tokio::test]
async fn facades_are_independent() {
    let storage = Arc::new(MemoryStorage::new());
    let left = SandFs::new(storage.clone(), FsConfig::rooted("/left"));
    let right = SandFs::new(storage.clone(), FsConfig::rooted("/right"));
    left.init(false).await;
    right.init(false).await;

    write(&left, "/same.txt", "L").await;
    write(&right, "/same.txt", "R").await;

    assert_eq!(read_text(&left, "/same.txt").await, "L");
    assert_eq!(read_text(&right, "/same.txt").await, "R");

    left.clear().await;
    assert!(!left.exists("/same.txt").await);
    assert!(right.exists("/same.txt").await);
}
