use std::io;
use std::sync::Arc;
use std::thread;

use treefs::{NodeKind, TreeFsBuilder};

pub fn main() {
    let fs = Arc::new(TreeFsBuilder::new().build().expect("should create"));
    fs.create("/home", NodeKind::Directory).unwrap();

    // Each thread fills its own directory while sharing the tree.
    let workers: Vec<_> = ["alice", "bob"]
        .iter()
        .copied()
        .map(|user| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || {
                let home = format!("/home/{}", user);
                fs.create(&home, NodeKind::Directory).unwrap();
                fs.create(&format!("{}/hello.txt", home), NodeKind::File).unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    fs.move_node("/home/bob/hello.txt", "/home/alice/from-bob.txt").unwrap();
    fs.print_tree(&mut io::stdout()).unwrap();
}
