use std::sync::Arc;

use tempfile::TempDir;
use treefs::{NodeKind, TreeFsBuilder};
use treefs_server::{Client, Server, ServerHandle};

fn start_server(dir: &TempDir, workers: usize) -> ServerHandle {
    let fs = Arc::new(TreeFsBuilder::new().build().unwrap());
    Server::bind(dir.path().join("server.sock"), fs)
        .unwrap()
        .spawn(workers)
        .unwrap()
}

#[test]
fn client_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(&dir, 2);
    let client = Client::mount(dir.path().join("server.sock"), dir.path().join("client.sock")).unwrap();

    assert_eq!(client.create("/a", NodeKind::Directory).unwrap(), 0);
    assert_eq!(client.create("/a/b", NodeKind::File).unwrap(), 0);
    assert_eq!(client.lookup("/a/b").unwrap(), 2);
    assert_eq!(client.create("/a/b", NodeKind::File).unwrap(), -4);
    assert_eq!(client.delete("/a").unwrap(), -18);
    assert_eq!(client.move_node("/a/b", "/c").unwrap(), 0);
    assert_eq!(client.lookup("/c").unwrap(), 2);
    assert_eq!(client.move_node("/a", "/a/a").unwrap(), -10);
    assert_eq!(client.lookup("/missing").unwrap(), -5);

    let dump = dir.path().join("tree.txt");
    assert_eq!(client.print(dump.to_str().unwrap()).unwrap(), 0);
    assert_eq!(std::fs::read_to_string(&dump).unwrap(), "\n/a\n/c\n");

    client.unmount().unwrap();
    assert!(!dir.path().join("client.sock").exists());
    server.shutdown().unwrap();
    assert!(!dir.path().join("server.sock").exists());
}

#[test]
fn concurrent_clients_share_one_tree() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(&dir, 4);

    let clients: Vec<_> = (0..4)
        .map(|i| {
            let server_path = dir.path().join("server.sock");
            let client_path = dir.path().join(format!("client{}.sock", i));
            std::thread::spawn(move || {
                let client = Client::mount(server_path, client_path).unwrap();
                let own = format!("/c{}", i);
                assert_eq!(client.create(&own, NodeKind::Directory).unwrap(), 0);
                for j in 0..5 {
                    let file = format!("{}/f{}", own, j);
                    assert_eq!(client.create(&file, NodeKind::File).unwrap(), 0);
                    assert!(client.lookup(&file).unwrap() > 0);
                }
                client.unmount().unwrap();
            })
        })
        .collect();
    for client in clients {
        client.join().unwrap();
    }

    let client = Client::mount(dir.path().join("server.sock"), dir.path().join("check.sock")).unwrap();
    for i in 0..4 {
        assert!(client.lookup(&format!("/c{}/f4", i)).unwrap() > 0);
    }
    client.unmount().unwrap();
    server.shutdown().unwrap();
}

#[test]
fn malformed_request_gets_other_code() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(&dir, 1);

    let socket_path = dir.path().join("raw.sock");
    let socket = std::os::unix::net::UnixDatagram::bind(&socket_path).unwrap();
    socket
        .send_to(b"z nonsense\0", dir.path().join("server.sock"))
        .unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(socket.recv(&mut buf).unwrap(), 4);
    assert_eq!(i32::from_be_bytes(buf), treefs_server::ERROR_OTHER);

    server.shutdown().unwrap();
}
