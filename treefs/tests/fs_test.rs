use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use treefs::{FsError, NodeKind, TreeFs, TreeFsBuilder};

fn new_fs() -> TreeFs {
    TreeFsBuilder::new().build().unwrap()
}

#[test]
fn create_lookup_delete_scenario() {
    let fs = new_fs();

    assert_eq!(fs.create("/a", NodeKind::Directory), Ok(1));
    assert_eq!(fs.create("/a/b", NodeKind::File), Ok(2));
    assert_eq!(fs.lookup("/a/b"), Ok(2));
    assert_eq!(fs.create("/a/b", NodeKind::File), Err(FsError::AlreadyExists));
    assert_eq!(fs.delete("/a"), Err(FsError::DirectoryNotEmpty));
    assert_eq!(fs.delete("/a/b"), Ok(()));
    assert_eq!(fs.delete("/a"), Ok(()));
    assert_eq!(fs.lookup("/a"), Err(FsError::NotFound));
}

#[test]
fn failed_delete_leaves_children_reachable() {
    let fs = new_fs();
    fs.create("/d", NodeKind::Directory).unwrap();
    let x = fs.create("/d/x", NodeKind::File).unwrap();
    let y = fs.create("/d/y", NodeKind::Directory).unwrap();

    assert_eq!(fs.delete("/d"), Err(FsError::DirectoryNotEmpty));
    assert_eq!(fs.lookup("/d/x"), Ok(x));
    assert_eq!(fs.lookup("/d/y"), Ok(y));
    assert_eq!(fs.live_inodes(), 4);
}

#[test]
fn move_directory_into_itself_is_rejected() {
    let fs = new_fs();
    fs.create("/a", NodeKind::Directory).unwrap();

    assert_eq!(fs.move_node("/a", "/a/a"), Err(FsError::InvalidOperation));
    assert_eq!(fs.lookup("/a"), Ok(1));
    assert_eq!(fs.lookup("/a/a"), Err(FsError::NotFound));
    assert_eq!(fs.live_inodes(), 2);
}

#[test]
fn moved_subtree_keeps_its_children() {
    let fs = new_fs();
    fs.create("/src", NodeKind::Directory).unwrap();
    fs.create("/dst", NodeKind::Directory).unwrap();
    fs.create("/src/tree", NodeKind::Directory).unwrap();
    let leaf = fs.create("/src/tree/leaf", NodeKind::File).unwrap();

    fs.move_node("/src/tree", "/dst/tree").unwrap();
    assert_eq!(fs.lookup("/dst/tree/leaf"), Ok(leaf));
    assert_eq!(fs.lookup("/src/tree"), Err(FsError::NotFound));

    let mut out = Vec::new();
    fs.print_tree(&mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "\n/src\n/dst\n/dst/tree\n/dst/tree/leaf\n"
    );
}

#[test]
fn create_then_delete_everything_restores_empty_table() {
    let fs = new_fs();
    let mut created = Vec::new();
    for i in 0..10 {
        let dir = format!("/d{}", i);
        fs.create(&dir, NodeKind::Directory).unwrap();
        created.push(dir.clone());
        for j in 0..3 {
            let file = format!("{}/f{}", dir, j);
            fs.create(&file, NodeKind::File).unwrap();
            created.push(file);
        }
    }
    assert_eq!(fs.live_inodes(), 41);

    // Deepest first, otherwise in an arbitrary interleaved order.
    created.sort_by_key(|p| std::cmp::Reverse((p.matches('/').count(), p.len() % 3)));
    for path in &created {
        fs.delete(path).unwrap();
    }

    assert_eq!(fs.live_inodes(), 1);
    // First-fit allocation hands out the lowest slots again.
    for i in 1..=20 {
        assert_eq!(fs.create(&format!("/n{}", i), NodeKind::File), Ok(i));
    }
}

#[test]
fn teardown_releases_every_live_inode() {
    let fs = new_fs();
    fs.create("/a", NodeKind::Directory).unwrap();
    fs.create("/a/b", NodeKind::File).unwrap();
    assert_eq!(fs.teardown(), 3);
}

#[test]
fn swapped_moves_do_not_deadlock() {
    let fs = Arc::new(new_fs());
    fs.create("/A", NodeKind::Directory).unwrap();
    fs.create("/B", NodeKind::Directory).unwrap();
    fs.create("/A/x", NodeKind::File).unwrap();
    fs.create("/B/z", NodeKind::File).unwrap();

    let (done_tx, done_rx) = mpsc::channel();
    let rounds = 2_000;
    let workers: Vec<_> = vec![("/A/x", "/B/y"), ("/B/z", "/A/w")]
        .into_iter()
        .map(|(src, dest)| {
            let fs = Arc::clone(&fs);
            let done = done_tx.clone();
            thread::spawn(move || {
                for _ in 0..rounds {
                    fs.move_node(src, dest).unwrap();
                    fs.move_node(dest, src).unwrap();
                }
                done.send(()).unwrap();
            })
        })
        .collect();

    for _ in 0..workers.len() {
        done_rx
            .recv_timeout(Duration::from_secs(30))
            .expect("moves deadlocked");
    }
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(fs.lookup("/A/x"), Ok(3));
    assert_eq!(fs.lookup("/B/z"), Ok(4));
}

#[test]
fn nested_and_crossing_moves_do_not_deadlock() {
    let fs = Arc::new(new_fs());
    for dir in &["/p", "/p/q", "/r", "/r/s"] {
        fs.create(dir, NodeKind::Directory).unwrap();
    }
    for file in &["/p/q/f1", "/r/f2", "/r/s/f3", "/p/f4"] {
        fs.create(file, NodeKind::File).unwrap();
    }

    let pairs = vec![
        ("/p/q/f1", "/r/s/g1"),
        ("/r/s/f3", "/p/q/g3"),
        ("/r/f2", "/p/q/g2"),
        ("/p/f4", "/r/s/g4"),
    ];
    let (done_tx, done_rx) = mpsc::channel();
    let workers: Vec<_> = pairs
        .into_iter()
        .map(|(src, dest)| {
            let fs = Arc::clone(&fs);
            let done = done_tx.clone();
            thread::spawn(move || {
                for _ in 0..1_000 {
                    fs.move_node(src, dest).unwrap();
                    fs.lookup(dest).unwrap();
                    fs.move_node(dest, src).unwrap();
                }
                done.send(()).unwrap();
            })
        })
        .collect();

    for _ in 0..workers.len() {
        done_rx
            .recv_timeout(Duration::from_secs(30))
            .expect("moves deadlocked");
    }
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(fs.live_inodes(), 9);
}

#[test]
fn move_is_atomic_to_observers() {
    let fs = Arc::new(new_fs());
    fs.create("/a", NodeKind::Directory).unwrap();
    fs.create("/b", NodeKind::Directory).unwrap();
    let x = fs.create("/a/x", NodeKind::File).unwrap();

    let mover = {
        let fs = Arc::clone(&fs);
        thread::spawn(move || {
            for _ in 0..2_000 {
                fs.move_node("/a/x", "/b/x").unwrap();
                fs.move_node("/b/x", "/a/x").unwrap();
            }
        })
    };

    for _ in 0..2_000 {
        let seen = fs.lookup_many(&["/a/x", "/b/x"]);
        let found: Vec<_> = seen.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(found, vec![&x], "observed {:?}", seen);
    }
    mover.join().unwrap();
}

#[test]
fn concurrent_creates_and_deletes_balance_out() {
    let fs = Arc::new(TreeFsBuilder::new().with_inode_capacity(64).build().unwrap());
    for t in 0..4 {
        fs.create(&format!("/t{}", t), NodeKind::Directory).unwrap();
    }

    let workers: Vec<_> = (0..4)
        .map(|t| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || {
                for round in 0..500 {
                    let path = format!("/t{}/n{}", t, round % 5);
                    fs.create(&path, NodeKind::File).unwrap();
                    fs.lookup(&path).unwrap();
                    fs.delete(&path).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(fs.live_inodes(), 5);
}

#[test]
fn contended_names_are_created_exactly_once() {
    let fs = Arc::new(new_fs());
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || fs.create("/shared", NodeKind::File).is_ok())
        })
        .collect();

    let winners = workers
        .into_iter()
        .map(|w| w.join().unwrap())
        .filter(|created| *created)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(fs.live_inodes(), 2);
}

#[test]
fn printing_during_mutations_does_not_deadlock() {
    let fs = Arc::new(new_fs());
    for dir in &["/A", "/B", "/C", "/A/d", "/C/e"] {
        fs.create(dir, NodeKind::Directory).unwrap();
    }
    fs.create("/A/d/f", NodeKind::File).unwrap();
    fs.create("/A/x", NodeKind::File).unwrap();

    let mut known: HashSet<String> = vec![
        "", "/A", "/B", "/C", "/C/e", "/A/d", "/B/d", "/A/d/f", "/B/d/f", "/A/x", "/C/e/x",
    ]
    .into_iter()
    .map(str::to_string)
    .collect();
    for i in 0..5 {
        known.insert(format!("/C/n{}", i));
    }
    let known = Arc::new(known);

    let (done_tx, done_rx) = mpsc::channel();
    let mut workers = Vec::new();
    for (src, dest) in vec![("/A/d", "/B/d"), ("/A/x", "/C/e/x")] {
        let fs = Arc::clone(&fs);
        let done = done_tx.clone();
        workers.push(thread::spawn(move || {
            for _ in 0..1_000 {
                fs.move_node(src, dest).unwrap();
                fs.move_node(dest, src).unwrap();
            }
            done.send(()).unwrap();
        }));
    }
    {
        let fs = Arc::clone(&fs);
        let done = done_tx.clone();
        workers.push(thread::spawn(move || {
            for round in 0..1_000 {
                let path = format!("/C/n{}", round % 5);
                fs.create(&path, NodeKind::File).unwrap();
                fs.delete(&path).unwrap();
            }
            done.send(()).unwrap();
        }));
    }
    for _ in 0..2 {
        let fs = Arc::clone(&fs);
        let known = Arc::clone(&known);
        let done = done_tx.clone();
        workers.push(thread::spawn(move || {
            for _ in 0..300 {
                let mut out = Vec::new();
                fs.print_tree(&mut out).unwrap();
                let out = String::from_utf8(out).unwrap();
                let lines: Vec<&str> = out.lines().collect();
                assert_eq!(lines.first(), Some(&""));
                for line in &lines {
                    assert!(known.contains(*line), "printed unknown path {:?}", line);
                }
                for top in &["/A", "/B", "/C"] {
                    assert!(lines.contains(top), "{} missing from {:?}", top, lines);
                }
            }
            done.send(()).unwrap();
        }));
    }

    for _ in 0..workers.len() {
        done_rx
            .recv_timeout(Duration::from_secs(30))
            .expect("print deadlocked with mutations");
    }
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(fs.lookup("/A/d/f"), Ok(6));
    assert_eq!(fs.live_inodes(), 8);
}
