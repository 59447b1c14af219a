//! Demonstration entries.
//!
//! The classic smoke tests for the broker: a pub/sub pair trading
//! timestamps on the `timeval` topic, a request/response pair measuring
//! round trips, and a rendezvous pair on a shared sync cell. Run them with
//! `exec <entry>` and stop them with `stop '<entry>-*'`.

use crate::EntryDef;
use crossbar_core::{
    ChannelCfg, EndpointCfg, Node, OpenMode, RecvError, ResponseError,
};
use std::{
    thread,
    time::{Duration, Instant},
};

fn publisher(_args: &[String]) -> i32 {
    let Some(node) = Node::current() else { return -1 };
    let log = node.logger();
    let p = match node.publisher::<Instant>(
        OpenMode::FindOrCreate,
        "timeval",
        ChannelCfg::default(),
    ) {
        Ok(p) => p,
        Err(e) => {
            log.error(format_args!("create publisher: {e}"));
            return -1;
        }
    };
    thread::sleep(Duration::from_millis(1000));
    while node.running() {
        p.push(Instant::now());
        thread::sleep(Duration::from_secs(1));
    }
    0
}

inventory::submit! { EntryDef { name: "publisher", run: publisher } }

fn subscriber(_args: &[String]) -> i32 {
    let Some(node) = Node::current() else { return -1 };
    let log = node.logger();
    let s = match node.subscriber::<Instant>(
        OpenMode::FindOrCreate,
        "timeval",
        ChannelCfg::default(),
    ) {
        Ok(s) => s,
        Err(e) => {
            log.error(format_args!("create subscriber: {e}"));
            return -1;
        }
    };
    while node.running() {
        match s.pop(Some(Duration::from_secs(2))) {
            Ok(stamp) => {
                log.info(format_args!("dt: {}us", stamp.elapsed().as_micros()))
            }
            Err(RecvError::Timeout) => (),
            Err(RecvError::NoPublishers) => thread::sleep(Duration::from_millis(100)),
        }
    }
    0
}

inventory::submit! { EntryDef { name: "subscriber", run: subscriber } }

fn server(_args: &[String]) -> i32 {
    let Some(node) = Node::current() else { return -1 };
    let log = node.logger();
    let s = match node.server::<Instant, Instant>(
        OpenMode::FindOrCreate,
        "timeval",
        EndpointCfg::default(),
    ) {
        Ok(s) => s,
        Err(e) => {
            log.error(format_args!("create server: {e}"));
            return -1;
        }
    };
    while node.running() {
        let Some((ts, responder)) = s.pop(Some(Duration::from_secs(2))) else {
            continue;
        };
        let tm = Instant::now();
        log.info(format_args!("ds: {}us", (tm - ts).as_micros()));
        responder.send(tm);
    }
    0
}

inventory::submit! { EntryDef { name: "server", run: server } }

fn client(_args: &[String]) -> i32 {
    let Some(node) = Node::current() else { return -1 };
    let log = node.logger();
    let c = match node.client::<Instant, Instant>(
        OpenMode::FindOrCreate,
        "timeval",
        EndpointCfg::default(),
    ) {
        Ok(c) => c,
        Err(e) => {
            log.error(format_args!("create client: {e}"));
            return -1;
        }
    };
    while node.running() {
        let ts = Instant::now();
        match c.push(ts).wait_timeout(Duration::from_secs(2)) {
            Ok(_tm) => log.info(format_args!("dr: {}us", ts.elapsed().as_micros())),
            Err(ResponseError::Lost) => log.warning(format_args!("request lost")),
            Err(ResponseError::Timeout) => {
                log.warning(format_args!("request timed out"))
            }
        }
        thread::sleep(Duration::from_millis(800));
    }
    0
}

inventory::submit! { EntryDef { name: "client", run: client } }

fn sync_waiter(_args: &[String]) -> i32 {
    let Some(node) = Node::current() else { return -1 };
    let log = node.logger();
    let cell = match node.sync_cell(OpenMode::FindOrCreate, "sync", 'a') {
        Ok(cell) => cell,
        Err(e) => {
            log.error(format_args!("create sync cell: {e}"));
            return -1;
        }
    };
    while node.running() {
        if cell.wait_timeout(&'e', Duration::from_millis(500)) {
            log.info(format_args!("current mode: 'e'"));
            thread::sleep(Duration::from_millis(500));
        }
    }
    0
}

inventory::submit! { EntryDef { name: "sync_waiter", run: sync_waiter } }

fn sync_setter(_args: &[String]) -> i32 {
    let Some(node) = Node::current() else { return -1 };
    let log = node.logger();
    let cell = match node.sync_cell(OpenMode::FindOrCreate, "sync", 'a') {
        Ok(cell) => cell,
        Err(e) => {
            log.error(format_args!("create sync cell: {e}"));
            return -1;
        }
    };
    let mut cnt = 0u64;
    while node.running() {
        cnt += 1;
        if cnt % 3 == 0 {
            log.info(format_args!("set mode to 'e'"));
            cell.update('e');
        } else {
            log.info(format_args!("set mode to 'a'"));
            cell.update('a');
        }
        thread::sleep(Duration::from_secs(1));
    }
    0
}

inventory::submit! { EntryDef { name: "sync_setter", run: sync_setter } }
