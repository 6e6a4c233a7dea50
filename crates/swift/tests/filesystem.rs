mod common;

use std::io::SeekFrom;
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use common::{container_url, object_url, SwiftEmulator, ACCOUNT, HOST};
use http::Method;
use swiftfs_swift::{AuthEntry, SwiftConfig, SwiftFileSystem, AUTH_TOKEN_HEADER, ETAG_KEY};
use swiftfs_vfs::{FileType, OpenMode, VfsBackend, VfsError};

#[tokio::test]
async fn list_container_root() -> Result<()> {
    let server = SwiftEmulator::with_sample_data();
    let fs = server.filesystem();

    let entries = fs.list(&container_url()).await?;
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["swift://server/a/c/f", "swift://server/a/c/hello"]);
    assert_eq!(entries[0].file_type, FileType::Directory);
    assert_eq!(entries[0].size, None);
    assert_eq!(entries[1].size, Some(11));
    assert_eq!(entries[1].extra_str("hash"), Some("b10a8db164e0754105b7a99be72e3fe5"));

    let listing = &server.requests()[0];
    assert_eq!(listing.url, "https://server/v1/a/c");
    assert_eq!(listing.query_value("format"), Some("json"));
    assert_eq!(listing.query_value("delimiter"), Some("/"));
    assert_eq!(listing.query_value("prefix"), Some(""));
    Ok(())
}

#[tokio::test]
async fn list_pseudo_directory() -> Result<()> {
    let server = SwiftEmulator::with_sample_data();
    let fs = server.filesystem();

    for path in [object_url("f"), object_url("f/"), "https://server/v1/a/c/f".to_string()] {
        let entries = fs.list(&path).await?;
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["swift://server/a/c/f/folder2", "swift://server/a/c/f/test.txt"]);
        assert!(entries[0].is_dir());
        assert_eq!(entries[1].size, Some(4));
    }
    assert!(server
        .requests()
        .iter()
        .all(|r| r.query_value("prefix") == Some("f/")));
    Ok(())
}

#[tokio::test]
async fn list_account_shows_containers() -> Result<()> {
    let server = SwiftEmulator::with_sample_data();
    server.create_container(ACCOUNT, "backups");
    let fs = server.filesystem();

    let entries = fs.list(&format!("swift://{HOST}/{ACCOUNT}")).await?;
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["swift://server/a/backups", "swift://server/a/c"]);
    assert!(entries.iter().all(|e| e.is_dir() && e.size.is_none()));
    assert_eq!(entries[1].extra.get("count"), Some(&serde_json::json!(3)));

    let request = &server.requests()[0];
    assert_eq!(request.url, "https://server/v1/a");
    assert_eq!(request.query_value("delimiter"), None);
    Ok(())
}

#[tokio::test]
async fn list_missing_container_is_not_found() {
    let server = SwiftEmulator::with_sample_data();
    let fs = server.filesystem();
    let err = fs.list("swift://server/a/nope").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn exists_file_dir_combinations() -> Result<()> {
    let server = SwiftEmulator::with_sample_data();
    let fs = server.filesystem();

    let hello = object_url("hello");
    assert!(fs.exists(&hello).await?);
    assert!(fs.is_file(&hello).await?);
    assert!(!fs.is_dir(&hello).await?);

    let missing = object_url("missing");
    assert!(!fs.exists(&missing).await?);
    assert!(!fs.is_file(&missing).await?);
    assert!(!fs.is_dir(&missing).await?);

    for container in [container_url(), format!("{}/", container_url())] {
        assert!(fs.exists(&container).await?);
        assert!(!fs.is_file(&container).await?);
        assert!(fs.is_dir(&container).await?);
    }
    Ok(())
}

#[tokio::test]
async fn stat_reports_object_metadata() -> Result<()> {
    let server = SwiftEmulator::with_sample_data();
    let fs = server.filesystem();

    let info = fs.stat("https://server/v1/a/c/hello").await?;
    assert_eq!(info.name, "swift://server/a/c/hello");
    assert_eq!(info.size, Some(11));
    assert!(info.is_file());
    assert_eq!(info.extra_str(ETAG_KEY), Some("b10a8db164e0754105b7a99be72e3fe5"));
    assert_eq!(info.extra_str("content_type"), Some("application/octet-stream"));
    assert!(info.extra_str("last_modified").is_some());

    assert_eq!(server.requests()[0].method, Method::HEAD);
    Ok(())
}

#[tokio::test]
async fn delete_then_list() -> Result<()> {
    let server = SwiftEmulator::with_sample_data();
    let fs = server.filesystem();

    fs.remove_file(&object_url("hello")).await?;
    let names = fs.list_names(&container_url()).await?;
    assert_eq!(names, vec!["swift://server/a/c/f"]);

    let err = fs.remove_file(&object_url("hello")).await.unwrap_err();
    assert!(err.is_not_found());

    let err = fs.remove_file(&container_url()).await.unwrap_err();
    assert!(matches!(err, VfsError::NotImplemented(_)));
    Ok(())
}

#[tokio::test]
async fn write_then_read() -> Result<()> {
    let server = SwiftEmulator::with_sample_data();
    let fs = server.filesystem();
    let path = object_url("new/data.bin");

    fs.write(&path, Bytes::from_static(b"some fresh bytes")).await?;
    assert_eq!(server.object("new/data.bin").as_deref(), Some(&b"some fresh bytes"[..]));
    assert_eq!(&fs.read(&path).await?[..], b"some fresh bytes");

    let names = fs.list_names(&object_url("new")).await?;
    assert_eq!(names, vec![path.clone()]);
    Ok(())
}

#[tokio::test]
async fn write_into_missing_container_fails_with_status() {
    let server = SwiftEmulator::with_sample_data();
    let fs = server.filesystem();
    let err = fs
        .write("swift://server/a/nope/obj", Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn range_reads() -> Result<()> {
    let server = SwiftEmulator::with_sample_data();
    let fs = server.filesystem();
    let hello = object_url("hello");

    assert_eq!(&fs.read_range(&hello, Some(3), Some(5)).await?[..], b"lo");
    assert_eq!(&fs.read_range(&hello, Some(6), None).await?[..], b"World");
    assert_eq!(&fs.read_range(&hello, None, None).await?[..], b"Hello World");

    let ranges: Vec<_> = server
        .requests()
        .iter()
        .map(|r| r.headers.get(http::header::RANGE).map(|v| v.to_str().unwrap().to_string()))
        .collect();
    assert_eq!(
        ranges,
        vec![Some("bytes=3-4".to_string()), Some("bytes=6-".to_string()), None]
    );

    let err = fs.read_range(&hello, None, Some(5)).await.unwrap_err();
    assert!(matches!(err, VfsError::NotImplemented(_)));
    assert_eq!(server.request_count(), 3);
    Ok(())
}

#[tokio::test]
async fn read_missing_object_is_not_found() {
    let server = SwiftEmulator::with_sample_data();
    let fs = server.filesystem();
    let err = fs.read(&object_url("missing")).await.unwrap_err();
    assert!(matches!(err, VfsError::NotFound { ref path } if path == "swift://server/a/c/missing"));
}

#[tokio::test]
async fn open_for_reading() -> Result<()> {
    let server = SwiftEmulator::with_sample_data();
    let fs = Arc::new(server.filesystem());

    let mut file = fs.open(&object_url("hello"), OpenMode::Read).await?;
    assert_eq!(file.size(), 11);
    file.seek(SeekFrom::Start(6))?;
    assert_eq!(&file.read(Some(5)).await?[..], b"World");
    file.close().await?;
    Ok(())
}

#[tokio::test]
async fn open_for_writing_uploads_on_close() -> Result<()> {
    let server = SwiftEmulator::with_sample_data();
    let fs = Arc::new(server.filesystem());
    let path = object_url("out.txt");

    let mut file = fs.open(&path, OpenMode::Write).await?;
    file.write(b"written ").await?;
    file.write(b"in pieces").await?;
    assert!(server.object("out.txt").is_none());

    file.close().await?;
    assert_eq!(server.object("out.txt").as_deref(), Some(&b"written in pieces"[..]));

    let put = server.requests().pop().unwrap();
    assert_eq!(put.method, Method::PUT);
    assert_eq!(put.headers.get(http::header::CONTENT_LENGTH).unwrap(), "17");
    Ok(())
}

#[tokio::test]
async fn writes_beyond_one_block_are_not_supported() -> Result<()> {
    let server = SwiftEmulator::with_sample_data();
    let config = SwiftConfig {
        block_size: 8,
        ..SwiftConfig::default()
    };
    let fs = Arc::new(server.filesystem_with(config));

    let mut file = fs.open(&object_url("large"), OpenMode::Write).await?;
    let err = file.write(b"more than eight bytes").await.unwrap_err();
    assert!(matches!(err, VfsError::NotImplemented(_)));
    assert_eq!(server.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn unique_key_follows_content() -> Result<()> {
    let server = SwiftEmulator::with_sample_data();
    let fs = server.filesystem();
    let hello = object_url("hello");

    let first = fs.unique_key(&hello).await?;
    assert_eq!(first, fs.unique_key(&hello).await?);
    assert_eq!(first.len(), 64);

    fs.write(&hello, Bytes::from_static(b"Goodbye")).await?;
    assert_ne!(first, fs.unique_key(&hello).await?);

    assert!(fs.unique_key(&container_url()).await.is_err());
    Ok(())
}

#[tokio::test]
async fn token_is_sent_to_matching_urls() -> Result<()> {
    let server = SwiftEmulator::with_token("tk-123");
    let unauthenticated = server.filesystem();
    let err = unauthenticated.read(&object_url("hello")).await.unwrap_err();
    assert_eq!(err.status(), Some(401));

    let config = SwiftConfig::default()
        .with_auth(AuthEntry::new("https://elsewhere/v1", "wrong")?)
        .with_auth(AuthEntry::new("https://server/v1/a", "tk-123")?);
    let fs = server.filesystem_with(config);
    assert_eq!(&fs.read(&object_url("hello")).await?[..], b"Hello World");

    let sent = server.requests().pop().unwrap();
    assert_eq!(sent.headers.get(AUTH_TOKEN_HEADER).unwrap(), "tk-123");
    Ok(())
}

#[tokio::test]
async fn close_releases_the_session() -> Result<()> {
    let server = SwiftEmulator::with_sample_data();
    let fs = server.filesystem();
    assert!(!fs.sessions().is_active());

    fs.list(&container_url()).await?;
    assert!(fs.sessions().is_active());

    fs.close().await?;
    assert!(!fs.sessions().is_active());

    // a later call opens a fresh session
    fs.stat(&object_url("hello")).await?;
    assert!(fs.sessions().is_active());
    Ok(())
}

#[test]
fn blocking_wrapper() -> Result<()> {
    let server = SwiftEmulator::with_sample_data();
    let fs = server.filesystem().blocking()?;

    assert!(fs.is_file(&object_url("hello"))?);
    fs.write(&object_url("sync.txt"), &b"from a plain thread"[..])?;
    assert_eq!(&fs.read(&object_url("sync.txt"))?[..], b"from a plain thread");

    let mut file = fs.open(&object_url("hello"), OpenMode::Read)?;
    assert_eq!(&file.read(Some(5))?[..], b"Hello");

    let mut writer = fs.open(&object_url("sync2.txt"), OpenMode::Write)?;
    writer.write(b"buffered")?;
    writer.close()?;
    assert_eq!(server.object("sync2.txt").as_deref(), Some(&b"buffered"[..]));

    assert!(matches!(
        fs.open(&container_url(), OpenMode::Write),
        Err(VfsError::InvalidTarget { .. })
    ));

    fs.close()?;
    assert!(!fs.backend().sessions().is_active());
    Ok(())
}

#[test]
fn dropping_the_blocking_wrapper_closes_the_session() {
    let server = SwiftEmulator::with_sample_data();
    let fs: Arc<SwiftFileSystem> = Arc::new(server.filesystem());
    let blocking = swiftfs_vfs::BlockingFs::from_arc(fs.clone()).unwrap();
    blocking.stat(&object_url("hello")).unwrap();
    drop(blocking);
    assert!(!fs.sessions().is_active());
}
