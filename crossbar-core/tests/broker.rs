use crossbar_core::{
    ChannelCfg, EndpointCfg, Node, ObjectKind, OpenMode, RecvError, ResponseError, registry,
};
use std::{
    thread,
    time::{Duration, Instant},
};

fn init() {
    let _ = env_logger::try_init();
}

fn stop_nodes(prefix: &str) {
    registry::visit::<Node>(ObjectKind::Node, |name, node| {
        if name.starts_with(prefix) {
            node.stop()
        }
    })
}

#[test]
fn pubsub_between_tasks() {
    init();
    let publisher = thread::spawn(|| {
        let node = Node::create("itest_pub").unwrap();
        let p = node
            .publisher::<Instant>(OpenMode::FindOrCreate, "itest-timeval", ChannelCfg::default())
            .unwrap();
        while node.running() {
            p.push(Instant::now());
            thread::sleep(Duration::from_millis(50));
        }
    });
    thread::sleep(Duration::from_millis(100));
    let node = Node::create("itest_sub").unwrap();
    let s = node
        .subscriber::<Instant>(OpenMode::FindOrCreate, "itest-timeval", ChannelCfg::default())
        .unwrap();
    let stamp = s.pop(Some(Duration::from_secs(2))).unwrap();
    assert!(stamp.elapsed() < Duration::from_secs(1));
    // stop the publisher the way the shell's stop command does
    stop_nodes("itest_pub-");
    let mut res = s.pop(Some(Duration::from_secs(2)));
    while res.is_ok() {
        res = s.pop(Some(Duration::from_secs(2)));
    }
    assert_eq!(res, Err(RecvError::NoPublishers));
    publisher.join().unwrap();
}

#[test]
fn request_response_between_tasks() {
    init();
    let server = thread::spawn(|| {
        let node = Node::create("itest_srv").unwrap();
        let s = node
            .server::<u64, u64>(OpenMode::FindOrCreate, "itest-succ", EndpointCfg::default())
            .unwrap();
        while node.running() {
            if let Some((v, responder)) = s.pop(Some(Duration::from_millis(100))) {
                responder.send(v + 1);
            }
        }
    });
    let node = Node::create("itest_cli").unwrap();
    let c = node
        .client::<u64, u64>(OpenMode::FindOrCreate, "itest-succ", EndpointCfg::default())
        .unwrap();
    assert_eq!(c.push(1).wait_timeout(Duration::from_secs(2)), Ok(2));
    stop_nodes("itest_srv-");
    server.join().unwrap();
    // with the server gone, the capacity-1 queue loses the overwritten request
    let first = c.push(10);
    let _second = c.push(11);
    assert_eq!(first.wait_timeout(Duration::from_secs(1)), Err(ResponseError::Lost));
}

#[test]
fn sync_rendezvous() {
    init();
    let node = Node::create("itest_sync").unwrap();
    let cell = node.sync_cell(OpenMode::FindOrCreate, "itest-mode", 'a').unwrap();
    let setter = {
        let cell = cell.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            cell.update('e');
        })
    };
    assert!(cell.wait_timeout(&'e', Duration::from_secs(2)));
    setter.join().unwrap();
}

#[test]
fn listing_tracks_refcounts() {
    init();
    let refs = || {
        registry::objects()
            .into_iter()
            .find(|(k, n, _)| *k == ObjectKind::Message && n == "itest-life")
            .map(|(_, _, r)| r)
    };
    let node = Node::create("itest_life").unwrap();
    assert_eq!(refs(), None);
    let p = node
        .publisher::<u32>(OpenMode::FindOrCreate, "itest-life", ChannelCfg::default())
        .unwrap();
    assert_eq!(refs(), Some(1));
    let s = node
        .subscriber::<u32>(OpenMode::FindOrCreate, "itest-life", ChannelCfg::default())
        .unwrap();
    assert_eq!(refs(), Some(2));
    drop(p);
    assert_eq!(refs(), Some(1));
    drop(s);
    assert_eq!(refs(), None);
}

#[test]
fn burst_overwrites_capacity_one() {
    init();
    let node = Node::create("itest_burst").unwrap();
    let p = node
        .publisher::<u32>(OpenMode::FindOrCreate, "itest-burst", ChannelCfg::default())
        .unwrap();
    let s = node
        .subscriber::<u32>(OpenMode::FindOrCreate, "itest-burst", ChannelCfg::default())
        .unwrap();
    let popper = thread::spawn(move || s.pop(Some(Duration::from_secs(5))));
    thread::sleep(Duration::from_millis(50));
    for i in 0..10 {
        p.push(i);
    }
    let got = popper.join().unwrap().unwrap();
    assert!(got < 10);
}

#[test]
fn node_exit_releases_the_registry_entry() {
    init();
    let worker = thread::spawn(|| {
        let node = Node::create("itest_exit").unwrap();
        while node.running() {
            thread::sleep(Duration::from_millis(20));
        }
    });
    thread::sleep(Duration::from_millis(100));
    let live = registry::objects()
        .into_iter()
        .any(|(k, n, _)| k == ObjectKind::Node && n.starts_with("itest_exit-"));
    assert!(live);
    stop_nodes("itest_exit-");
    worker.join().unwrap();
    let live = registry::objects()
        .into_iter()
        .any(|(k, n, _)| k == ObjectKind::Node && n.starts_with("itest_exit-"));
    assert!(!live);
}
