//! End-to-end tests against a running `shellhub-daemon` process.

use serde_json::json;
use shellhub_core::{Channel, IndexChange, Notification};
use shellhub_ipc::{IpcClient, Request, Response, ResponseData};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::tempdir;
use tokio::process::{Child, Command};
use tokio::time::timeout;

struct RunningDaemon {
    child: Child,
    socket_path: PathBuf,
    pid_file: PathBuf,
}

fn write_shell(dir: &Path, id: &str, children: &[&str]) {
    let elements: Vec<_> = children
        .iter()
        .map(|child| {
            json!({
                "modelType": "ReferenceElement",
                "idShort": child,
                "value": {
                    "type": "ModelReference",
                    "keys": [{ "type": "AssetAdministrationShell", "value": child }]
                }
            })
        })
        .collect();
    let environment = json!({
        "assetAdministrationShells": [{
            "id": id,
            "idShort": id.to_uppercase(),
            "assetInformation": { "assetKind": "Instance", "globalAssetId": format!("urn:asset:{id}") },
            "submodels": [{ "type": "ModelReference", "keys": [{ "type": "Submodel", "value": format!("sm-{id}") }] }]
        }],
        "submodels": [{
            "id": format!("sm-{id}"),
            "idShort": "Parts",
            "submodelElements": elements
        }]
    });
    std::fs::write(dir.join(format!("{id}.json")), environment.to_string()).unwrap();
}

async fn start_daemon(root: &Path, shells: &Path) -> RunningDaemon {
    let socket_path = root.join("shellhub.sock");
    let pid_file = root.join("shellhub.pid");
    let config = format!(
        r#"
socket_path: {socket}
data_dir: {data}
pid_file: {pid}
log_level: debug
scan:
  cooldown_secs: 1
  watch_debounce_ms: 100
default_endpoints:
  - name: local
    url: {shells}
    kind: file_system
"#,
        socket = socket_path.display(),
        data = root.join("data").display(),
        pid = pid_file.display(),
        shells = shells.display(),
    );
    let config_path = root.join("config.yaml");
    std::fs::write(&config_path, config).unwrap();

    let child = Command::new(env!("CARGO_BIN_EXE_shellhub-daemon"))
        .env("SHELLHUB_CONFIG", &config_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    for _ in 0..500 {
        if socket_path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(socket_path.exists(), "daemon never bound its socket");

    RunningDaemon {
        child,
        socket_path,
        pid_file,
    }
}

async fn wait_for_documents(client: &IpcClient, expected: usize) {
    for _ in 0..500 {
        if let Ok(status) = client.get_status().await {
            if status.documents == expected {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("index never reached {expected} documents");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_daemon_serves_index_and_hierarchy() {
    let root = tempdir().unwrap();
    let shells = root.path().join("shells");
    std::fs::create_dir_all(&shells).unwrap();
    write_shell(&shells, "pump", &["valve"]);
    write_shell(&shells, "valve", &[]);

    let mut daemon = start_daemon(root.path(), &shells).await;
    let client = IpcClient::with_socket_path(&daemon.socket_path);
    wait_for_documents(&client, 2).await;

    let page = client.page(None, None, None).await.unwrap();
    let ids: Vec<_> = page.items.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["pump", "valve"]);

    let pump = client.find(None, "urn:asset:pump").await.unwrap().unwrap();
    assert_eq!(pump.source, "local");

    match client
        .request(Request::GetHierarchy {
            source: "local".to_string(),
            id: "pump".to_string(),
        })
        .await
        .unwrap()
    {
        Response::Ok {
            data: Some(ResponseData::Hierarchy { root }),
        } => {
            assert_eq!(root.document.id, "pump");
            assert_eq!(root.children.len(), 1);
            assert_eq!(root.children[0].document.id, "valve");
            assert_eq!(root.children[0].parent_id.as_deref(), Some("pump"));
        }
        other => panic!("Expected hierarchy, got {other:?}"),
    }

    client.command(Request::Shutdown).await.unwrap();
    let status = timeout(Duration::from_secs(10), daemon.child.wait())
        .await
        .unwrap()
        .unwrap();
    assert!(status.success());
    assert!(!daemon.socket_path.exists());
    assert!(!daemon.pid_file.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_daemon_pushes_changes_from_disk() {
    let root = tempdir().unwrap();
    let shells = root.path().join("shells");
    std::fs::create_dir_all(&shells).unwrap();
    write_shell(&shells, "pump", &[]);

    let mut daemon = start_daemon(root.path(), &shells).await;
    let client = IpcClient::with_socket_path(&daemon.socket_path);
    wait_for_documents(&client, 1).await;

    let mut stream = client.subscribe(Channel::Index).await.unwrap();
    write_shell(&shells, "valve", &[]);

    let added = timeout(Duration::from_secs(10), async {
        loop {
            match stream.next().await.unwrap() {
                Some(Notification::Index(IndexChange::Added { document })) => return document,
                Some(_) => continue,
                None => panic!("daemon closed the stream"),
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(added.id, "valve");
    assert!(added.content.is_none());

    std::fs::remove_file(shells.join("pump.json")).unwrap();
    let removed = timeout(Duration::from_secs(10), async {
        loop {
            match stream.next().await.unwrap() {
                Some(Notification::Index(IndexChange::Removed { document })) => return document,
                Some(_) => continue,
                None => panic!("daemon closed the stream"),
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(removed.id, "pump");
    wait_for_documents(&client, 1).await;

    drop(stream);
    client.command(Request::Shutdown).await.unwrap();
    timeout(Duration::from_secs(10), daemon.child.wait())
        .await
        .unwrap()
        .unwrap();
}
