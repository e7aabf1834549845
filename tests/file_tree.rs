mod common;

use classdrive::services::file_service::{FileError, FileService};
use common::{TEST_MAX_UPLOAD, setup};

async fn upload(files: &FileService, parent: &str, name: &str, body: &[u8]) {
    files
        .upload_file(parent, name, body, Some("text/plain"), TEST_MAX_UPLOAD)
        .await
        .unwrap();
}

/// Regular files anywhere below `dir`.
fn count_files(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| {
                    let path = e.path();
                    if path.is_dir() { count_files(&path) } else { 1 }
                })
                .sum()
        })
        .unwrap_or(0)
}

fn paths_of(entries: &[classdrive::models::path_entry::PathEntry]) -> Vec<String> {
    entries.iter().map(|e| e.path.clone()).collect()
}

#[tokio::test]
async fn created_folder_is_listed_once() {
    let env = setup().await;
    let files = &env.state.files;

    let entry = files.create_folder("/", "Materi").await.unwrap();
    assert_eq!(entry.path, "/Materi/");
    assert_eq!(entry.parent_path, "/");

    let children = files.list_children("/").await.unwrap();
    let matching: Vec<_> = children.iter().filter(|e| e.name == "Materi").collect();
    assert_eq!(matching.len(), 1);
    assert!(matching[0].is_folder);
}

#[tokio::test]
async fn folders_sort_before_files() {
    let env = setup().await;
    let files = &env.state.files;

    upload(files, "/", "a.txt", b"a").await;
    files.create_folder("/", "zeta").await.unwrap();
    files.create_folder("/", "Alpha").await.unwrap();

    let names: Vec<_> = files
        .list_children("/")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["Alpha", "zeta", "a.txt"]);
}

#[tokio::test]
async fn invalid_and_duplicate_folder_names() {
    let env = setup().await;
    let files = &env.state.files;

    for bad in ["a/b", "x:y", "what?", "", "  ", "..", "a\tb", "baris\nbaru"] {
        let err = files.create_folder("/", bad).await.unwrap_err();
        assert!(matches!(err, FileError::InvalidName { .. }), "{bad:?}");
    }

    files.create_folder("/", "Dup").await.unwrap();
    let err = files.create_folder("/", "Dup").await.unwrap_err();
    assert!(matches!(err, FileError::AlreadyExists(_)));

    let err = files.create_folder("/missing/", "x").await.unwrap_err();
    assert!(matches!(err, FileError::NotFound(_)));
}

#[tokio::test]
async fn upload_sanitizes_name_and_enforces_limit() {
    let env = setup().await;
    let files = &env.state.files;

    let entry = files
        .upload_file("/", "report final!!.pdf", b"%PDF", None, TEST_MAX_UPLOAD)
        .await
        .unwrap();
    assert_eq!(entry.name, "report_final__.pdf");
    assert_eq!(entry.path, "/report_final__.pdf");
    assert_eq!(entry.mime_type.as_deref(), Some("application/octet-stream"));

    let exact = vec![0u8; TEST_MAX_UPLOAD];
    files
        .upload_file("/", "exact.bin", &exact, None, TEST_MAX_UPLOAD)
        .await
        .unwrap();

    let over = vec![0u8; TEST_MAX_UPLOAD + 1];
    let err = files
        .upload_file("/", "over.bin", &over, None, TEST_MAX_UPLOAD)
        .await
        .unwrap_err();
    assert!(matches!(err, FileError::TooLarge { size, max, .. } if size == max + 1));
}

#[tokio::test]
async fn reupload_overwrites_in_place() {
    let env = setup().await;
    let files = &env.state.files;

    upload(files, "/", "notes.txt", b"first").await;
    let first = files.get_entry("/notes.txt").await.unwrap();
    upload(files, "/", "notes.txt", b"second version").await;
    let second = files.get_entry("/notes.txt").await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.size_bytes, Some(14));
    assert_eq!(files.list_children("/").await.unwrap().len(), 1);

    let stored = std::fs::read(files.blobs.blob_path("notes.txt")).unwrap();
    assert_eq!(stored, b"second version");
}

#[tokio::test]
async fn failed_reupload_keeps_previous_file() {
    let env = setup().await;
    let files = &env.state.files;

    upload(files, "/", "nilai.txt", b"old").await;
    sqlx::query(
        "CREATE TRIGGER refuse_large_update BEFORE UPDATE ON files
         WHEN NEW.size_bytes > 4
         BEGIN SELECT RAISE(ABORT, 'refused'); END",
    )
    .execute(&*files.db)
    .await
    .unwrap();

    let err = files
        .upload_file("/", "nilai.txt", b"much newer", None, TEST_MAX_UPLOAD)
        .await
        .unwrap_err();
    assert!(matches!(err, FileError::Sqlx(_)), "{err:?}");

    let entry = files.get_entry("/nilai.txt").await.unwrap();
    assert_eq!(entry.size_bytes, Some(3));
    assert_eq!(
        std::fs::read(files.blobs.blob_path("nilai.txt")).unwrap(),
        b"old"
    );
    // the staged payload is gone
    assert_eq!(count_files(&files.blobs.base_path), 1);

    // a new file refused by the database leaves nothing on disk
    sqlx::query(
        "CREATE TRIGGER refuse_large_insert BEFORE INSERT ON files
         WHEN NEW.size_bytes > 4
         BEGIN SELECT RAISE(ABORT, 'refused'); END",
    )
    .execute(&*files.db)
    .await
    .unwrap();
    files
        .upload_file("/", "baru.txt", b"too large", None, TEST_MAX_UPLOAD)
        .await
        .unwrap_err();
    assert!(files.get_entry("/baru.txt").await.is_err());
    assert_eq!(count_files(&files.blobs.base_path), 1);
}

#[tokio::test]
async fn folder_rename_rewrites_subtree() {
    let env = setup().await;
    let files = &env.state.files;

    files.create_folder("/", "F").await.unwrap();
    files.create_folder("/F/", "b").await.unwrap();
    upload(files, "/F/", "a", b"a-bytes").await;
    upload(files, "/F/b/", "c", b"c-bytes").await;
    files.create_folder("/", "Fx").await.unwrap();

    let renamed = files.rename("/F/", "F2").await.unwrap();
    assert_eq!(renamed.path, "/F2/");
    assert_eq!(renamed.name, "F2");

    let a = files.get_entry("/F2/a").await.unwrap();
    assert_eq!(a.parent_path, "/F2/");
    let c = files.get_entry("/F2/b/c").await.unwrap();
    assert_eq!(c.parent_path, "/F2/b/");
    assert_eq!(c.blob_ref.as_deref(), Some("F2/b/c"));

    assert!(matches!(
        files.get_entry("/F/a").await.unwrap_err(),
        FileError::NotFound(_)
    ));
    assert!(files.list_children("/F/").await.is_err());
    // a sibling sharing the prefix is untouched
    assert!(files.get_entry("/Fx/").await.is_ok());

    assert_eq!(
        std::fs::read(files.blobs.blob_path("F2/b/c")).unwrap(),
        b"c-bytes"
    );
    assert!(!files.blobs.blob_path("F/b/c").exists());
}

#[tokio::test]
async fn folder_rename_rolls_back_when_a_blob_is_missing() {
    let env = setup().await;
    let files = &env.state.files;

    files.create_folder("/", "F").await.unwrap();
    upload(files, "/F/", "a.txt", b"a-bytes").await;
    upload(files, "/F/", "b.txt", b"b-bytes").await;
    // a.txt moves first, then b.txt fails
    std::fs::remove_file(files.blobs.blob_path("F/b.txt")).unwrap();

    let err = files.rename("/F/", "G").await.unwrap_err();
    assert!(matches!(err, FileError::Io(_)), "{err:?}");

    let a = files.get_entry("/F/a.txt").await.unwrap();
    assert_eq!(a.blob_ref.as_deref(), Some("F/a.txt"));
    assert!(files.get_entry("/F/b.txt").await.is_ok());
    assert!(matches!(
        files.get_entry("/G/").await.unwrap_err(),
        FileError::NotFound(_)
    ));
    assert_eq!(
        std::fs::read(files.blobs.blob_path("F/a.txt")).unwrap(),
        b"a-bytes"
    );
    assert!(!files.blobs.blob_path("G/a.txt").exists());
}

#[tokio::test]
async fn rename_file_and_conflicts() {
    let env = setup().await;
    let files = &env.state.files;

    upload(files, "/", "one.txt", b"1").await;
    upload(files, "/", "two.txt", b"2").await;

    let err = files.rename("/one.txt", "two.txt").await.unwrap_err();
    assert!(matches!(err, FileError::AlreadyExists(_)));

    for bad in ["bad|name", "tab\there"] {
        let err = files.rename("/one.txt", bad).await.unwrap_err();
        assert!(matches!(err, FileError::InvalidName { .. }), "{bad:?}");
    }

    let moved = files.rename("/one.txt", "uno.txt").await.unwrap();
    assert_eq!(moved.path, "/uno.txt");
    assert!(files.blobs.blob_path("uno.txt").exists());

    let same = files.rename("/uno.txt", "uno.txt").await.unwrap();
    assert_eq!(same.path, "/uno.txt");

    let err = files.rename("/ghost.txt", "x").await.unwrap_err();
    assert!(matches!(err, FileError::NotFound(_)));
}

#[tokio::test]
async fn delete_cascades_only_inside_prefix() {
    let env = setup().await;
    let files = &env.state.files;

    files.create_folder("/", "a_b").await.unwrap();
    files.create_folder("/a_b/", "deep").await.unwrap();
    upload(files, "/a_b/deep/", "x.txt", b"x").await;
    // `_` must not act as a wildcard
    files.create_folder("/", "aXb").await.unwrap();
    upload(files, "/aXb/", "keep.txt", b"keep").await;
    // neither must case be folded
    files.create_folder("/", "A_B").await.unwrap();

    let summary = files.delete("/a_b").await.unwrap();
    assert_eq!(summary.path, "/a_b/");
    assert_eq!(summary.entries_removed, 3);
    assert_eq!(summary.blobs_removed, 1);

    let remaining = paths_of(&files.list_children("/").await.unwrap());
    assert_eq!(remaining, vec!["/A_B/", "/aXb/"]);
    assert!(files.get_entry("/aXb/keep.txt").await.is_ok());
    assert!(!files.blobs.blob_path("a_b/deep/x.txt").exists());

    let stats = files.stats().await.unwrap();
    assert_eq!(stats.file_count, 1);
    assert_eq!(stats.folder_count, 2);
    assert_eq!(stats.total_bytes, 4);
}

#[tokio::test]
async fn delete_single_file() {
    let env = setup().await;
    let files = &env.state.files;

    upload(files, "/", "gone.txt", b"bye").await;
    let summary = files.delete("/gone.txt").await.unwrap();
    assert_eq!(summary.entries_removed, 1);
    assert_eq!(summary.blobs_removed, 1);

    let err = files.delete("/gone.txt").await.unwrap_err();
    assert!(matches!(err, FileError::NotFound(_)));
}
