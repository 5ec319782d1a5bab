//! Installer facade tests

use std::path::Path;
use std::time::Duration;

use cloudctl_core::repos::PluginRepo;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::http::build_client;

const PLATFORM: &str = "linux64";

fn installer(root: &TempDir, repos: Vec<PluginRepo>) -> PluginInstaller {
    let client = build_client(10).unwrap();
    PluginInstaller::new(
        Downloader::new(client.clone(), Duration::from_secs(10)),
        RepoIndexClient::new(client, Duration::from_secs(10)),
        repos,
        root.path().join(".staging"),
    )
}

fn staging_is_empty(root: &TempDir) -> bool {
    let staging = root.path().join(".staging");
    !staging.exists() || std::fs::read_dir(staging).unwrap().next().is_none()
}

fn indexed(plugin: &str, repos: RepoSelector) -> InstallRequest {
    InstallRequest::for_platform(
        InstallSource::Indexed {
            plugin: plugin.to_string(),
            repos,
        },
        PLATFORM,
    )
    .unwrap()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn index_body(base: &str, checksum: &str) -> String {
    format!(
        r#"{{"plugins": [{{
            "name": "foo",
            "version": "1.2.0",
            "binaries": [
                {{"platform": "linux64", "url": "{base}/foo-1.2.0-linux64", "checksum": "{checksum}"}},
                {{"platform": "osx", "url": "{base}/foo-1.2.0-osx", "checksum": ""}}
            ]
        }}]}}"#
    )
}

#[test]
fn test_request_rejects_blank_inputs() {
    assert!(matches!(
        InstallRequest::new(InstallSource::Direct("  ".to_string())),
        Err(PluginError::Usage(_))
    ));
    assert!(matches!(
        InstallRequest::new(InstallSource::Indexed {
            plugin: "foo".to_string(),
            repos: RepoSelector::Named(String::new()),
        }),
        Err(PluginError::Usage(_))
    ));
}

#[test]
fn test_request_from_args_uses_empty_repo_as_direct() {
    let request = InstallRequest::from_args("./foo", "").unwrap();
    assert_eq!(request.source(), &InstallSource::Direct("./foo".to_string()));

    let request = InstallRequest::from_args("foo", "main").unwrap();
    assert_eq!(
        request.source(),
        &InstallSource::Indexed {
            plugin: "foo".to_string(),
            repos: RepoSelector::Named("main".to_string()),
        }
    );
    assert_eq!(request.platform(), platform::current());
}

#[tokio::test]
async fn test_direct_url_install() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/foo-linux64")
        .with_status(200)
        .with_body(vec![1u8; 4096])
        .create_async()
        .await;

    let root = TempDir::new().unwrap();
    let request = InstallRequest::for_platform(
        InstallSource::Direct(format!("{}/foo-linux64", server.url())),
        PLATFORM,
    )
    .unwrap();

    let staged = installer(&root, Vec::new()).install(&request).await.unwrap();
    assert_eq!(staged.artifact.bytes, 4096);
    assert!(staged.path().starts_with(staged.staging_dir()));
    assert!(staged.path().exists());
    assert!(!staged.verified);
    assert_eq!(staged.install_name(), "foo-linux64");

    let staging_dir = staged.staging_dir().to_path_buf();
    drop(staged);
    assert!(!staging_dir.exists());
}

#[tokio::test]
async fn test_direct_local_install_copies_file() {
    let root = TempDir::new().unwrap();
    let source = root.path().join("my-plugin");
    std::fs::write(&source, b"#!/bin/sh\n").unwrap();

    let request = InstallRequest::for_platform(
        InstallSource::Direct(source.display().to_string()),
        PLATFORM,
    )
    .unwrap();
    let staged = installer(&root, Vec::new()).install(&request).await.unwrap();

    assert_eq!(staged.artifact.bytes, 10);
    assert!(staged.artifact.source_url.is_none());
    drop(staged);
    // the user's file is never consumed
    assert!(source.exists());
}

#[tokio::test]
async fn test_direct_missing_source_cleans_staging() {
    let root = TempDir::new().unwrap();
    let request = InstallRequest::for_platform(
        InstallSource::Direct(root.path().join("nope").display().to_string()),
        PLATFORM,
    )
    .unwrap();

    let err = installer(&root, Vec::new()).install(&request).await.unwrap_err();
    assert!(matches!(err, PluginError::SourceNotFound(_)));
    assert!(staging_is_empty(&root));

    let request = InstallRequest::for_platform(
        InstallSource::Direct(root.path().display().to_string()),
        PLATFORM,
    )
    .unwrap();
    let err = installer(&root, Vec::new()).install(&request).await.unwrap_err();
    assert!(matches!(err, PluginError::SourceNotFound(_)));
}

#[tokio::test]
async fn test_indexed_install_happy_path() {
    let mut server = mockito::Server::new_async().await;
    let binary = b"foo plugin binary".to_vec();
    let _list = server
        .mock("GET", "/list")
        .with_status(200)
        .with_body(index_body(&server.url(), &sha256_hex(&binary)))
        .create_async()
        .await;
    let _bin = server
        .mock("GET", "/foo-1.2.0-linux64")
        .with_status(200)
        .with_body(binary.clone())
        .create_async()
        .await;

    let root = TempDir::new().unwrap();
    let repos = vec![PluginRepo::new("main", format!("{}/", server.url()))];
    let staged = installer(&root, repos)
        .install(&indexed("foo", RepoSelector::Named("MAIN".to_string())))
        .await
        .unwrap();

    assert!(staged.verified);
    assert_eq!(staged.repo.as_deref(), Some("main"));
    assert_eq!(staged.install_name(), "foo");
    assert_eq!(staged.plugin.as_ref().unwrap().version, "1.2.0");
    assert_eq!(std::fs::read(staged.path()).unwrap(), binary);
}

#[tokio::test]
async fn test_indexed_install_without_checksum_is_unverified() {
    let mut server = mockito::Server::new_async().await;
    let _list = server
        .mock("GET", "/list")
        .with_status(200)
        .with_body(index_body(&server.url(), ""))
        .create_async()
        .await;
    let _bin = server
        .mock("GET", "/foo-1.2.0-linux64")
        .with_status(200)
        .with_body("anything")
        .create_async()
        .await;

    let root = TempDir::new().unwrap();
    let repos = vec![PluginRepo::new("main", server.url())];
    let staged = installer(&root, repos)
        .install(&indexed("foo", RepoSelector::Named("main".to_string())))
        .await
        .unwrap();
    assert!(!staged.verified);
}

#[tokio::test]
async fn test_digest_mismatch_removes_file_and_stops_search() {
    let mut main = mockito::Server::new_async().await;
    let mut backup = mockito::Server::new_async().await;
    let _list = main
        .mock("GET", "/list")
        .with_status(200)
        .with_body(index_body(&main.url(), &sha256_hex(b"the real thing")))
        .create_async()
        .await;
    let _bin = main
        .mock("GET", "/foo-1.2.0-linux64")
        .with_status(200)
        .with_body("tampered")
        .create_async()
        .await;
    let backup_list = backup
        .mock("GET", "/list")
        .expect(0)
        .create_async()
        .await;

    let root = TempDir::new().unwrap();
    let repos = vec![
        PluginRepo::new("main", main.url()),
        PluginRepo::new("backup", backup.url()),
    ];
    let err = installer(&root, repos)
        .install(&indexed("foo", RepoSelector::AnyConfigured))
        .await
        .unwrap_err();

    assert!(matches!(err, PluginError::DigestMismatch { .. }));
    assert!(staging_is_empty(&root));
    backup_list.assert_async().await;
}

#[tokio::test]
async fn test_named_repo_digest_mismatch_cleans_staging() {
    let mut server = mockito::Server::new_async().await;
    let _list = server
        .mock("GET", "/list")
        .with_status(200)
        .with_body(index_body(&server.url(), &sha256_hex(b"the real thing")))
        .create_async()
        .await;
    let _bin = server
        .mock("GET", "/foo-1.2.0-linux64")
        .with_status(200)
        .with_body("tampered")
        .create_async()
        .await;

    let root = TempDir::new().unwrap();
    let repos = vec![PluginRepo::new("main", server.url())];
    let err = installer(&root, repos)
        .install(&indexed("foo", RepoSelector::Named("main".to_string())))
        .await
        .unwrap_err();

    match err {
        PluginError::DigestMismatch { expected, actual } => {
            assert_eq!(expected, sha256_hex(b"the real thing"));
            assert_eq!(actual, sha256_hex(b"tampered"));
        }
        other => panic!("expected DigestMismatch, got {other:?}"),
    }
    assert!(staging_is_empty(&root));
}

#[tokio::test]
async fn test_search_all_skips_repo_that_is_not_a_plugin_repo() {
    let mut a = mockito::Server::new_async().await;
    let mut b = mockito::Server::new_async().await;
    let _a_list = a.mock("GET", "/list").with_status(404).create_async().await;
    let _b_list = b
        .mock("GET", "/list")
        .with_status(200)
        .with_body(index_body(&b.url(), ""))
        .create_async()
        .await;
    let _b_bin = b
        .mock("GET", "/foo-1.2.0-linux64")
        .with_status(200)
        .with_body("foo")
        .create_async()
        .await;

    let root = TempDir::new().unwrap();
    let repos = vec![PluginRepo::new("a", a.url()), PluginRepo::new("b", b.url())];
    let staged = installer(&root, repos)
        .install(&indexed("foo", RepoSelector::AnyConfigured))
        .await
        .unwrap();

    assert_eq!(staged.repo.as_deref(), Some("b"));
    assert_eq!(staged.skipped.len(), 1);
    assert_eq!(staged.skipped[0].repo, "a");
}

#[tokio::test]
async fn test_search_all_stops_at_first_success() {
    let mut a = mockito::Server::new_async().await;
    let mut b = mockito::Server::new_async().await;
    let _a_list = a
        .mock("GET", "/list")
        .with_status(200)
        .with_body(index_body(&a.url(), ""))
        .create_async()
        .await;
    let _a_bin = a
        .mock("GET", "/foo-1.2.0-linux64")
        .with_status(200)
        .with_body("foo")
        .create_async()
        .await;
    let b_list = b.mock("GET", "/list").expect(0).create_async().await;

    let root = TempDir::new().unwrap();
    let repos = vec![PluginRepo::new("a", a.url()), PluginRepo::new("b", b.url())];
    let staged = installer(&root, repos)
        .install(&indexed("foo", RepoSelector::AnyConfigured))
        .await
        .unwrap();

    assert_eq!(staged.repo.as_deref(), Some("a"));
    assert!(staged.skipped.is_empty());
    b_list.assert_async().await;
}

#[tokio::test]
async fn test_search_all_exhausted_lists_every_repo() {
    let mut a = mockito::Server::new_async().await;
    let _a_list = a
        .mock("GET", "/list")
        .with_status(200)
        .with_body(r#"{"plugins": []}"#)
        .create_async()
        .await;

    let root = TempDir::new().unwrap();
    let repos = vec![
        PluginRepo::new("a", a.url()),
        PluginRepo::new("down", "http://127.0.0.1:1"),
    ];
    let err = installer(&root, repos)
        .install(&indexed("foo", RepoSelector::AnyConfigured))
        .await
        .unwrap_err();

    match err {
        PluginError::NotFoundInAnyRepository { name, outcomes } => {
            assert_eq!(name, "foo");
            let repos: Vec<_> = outcomes.iter().map(|o| o.repo.as_str()).collect();
            assert_eq!(repos, ["a", "down"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(staging_is_empty(&root));
}

#[tokio::test]
async fn test_named_repo_errors() {
    let root = TempDir::new().unwrap();
    let err = installer(&root, Vec::new())
        .install(&indexed("foo", RepoSelector::Named("main".to_string())))
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::UnknownRepo(name) if name == "main"));

    let mut server = mockito::Server::new_async().await;
    let _list = server
        .mock("GET", "/list")
        .with_status(200)
        .with_body(index_body(&server.url(), ""))
        .create_async()
        .await;
    let repos = vec![PluginRepo::new("main", server.url())];

    let request = InstallRequest::for_platform(
        InstallSource::Indexed {
            plugin: "foo".to_string(),
            repos: RepoSelector::Named("main".to_string()),
        },
        "win64",
    )
    .unwrap();
    let err = installer(&root, repos.clone()).install(&request).await.unwrap_err();
    assert!(matches!(err, PluginError::PlatformUnsupported { .. }));

    let err = installer(&root, repos)
        .install(&indexed("bar", RepoSelector::Named("main".to_string())))
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::PluginNotFound { .. }));
    assert!(staging_is_empty(&root));
}

/// Serves headers and a few body bytes, then stalls forever
async fn stalling_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\npartial...")
                    .await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_secs(60)).await;
            });
        }
    });
    format!("http://{}", addr)
}

fn staging_in_use(root: &Path) -> bool {
    let staging = root.join(".staging");
    if !staging.exists() {
        return false;
    }
    std::fs::read_dir(staging).unwrap().next().is_some()
}

#[tokio::test]
async fn test_cancel_mid_download_cleans_up() {
    let base = stalling_server().await;
    let root = TempDir::new().unwrap();
    let installer = installer(&root, Vec::new());
    let request = InstallRequest::for_platform(
        InstallSource::Direct(format!("{}/foo-linux64", base)),
        PLATFORM,
    )
    .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let staging_root = root.path().to_path_buf();
    let watcher = tokio::spawn(async move {
        // wait until the install has started staging, then cancel
        for _ in 0..100 {
            if staging_in_use(&staging_root) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        trigger.cancel();
    });

    let err = installer
        .install_with_cancel(&request, &cancel)
        .await
        .unwrap_err();
    watcher.await.unwrap();

    assert!(matches!(err, PluginError::Cancelled));
    assert!(staging_is_empty(&root));
}
