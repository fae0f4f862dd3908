//! End-to-end tests over Unix socket pairs

use std::io::Read;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::time::Duration;

use fanout_rs::{
    Chunk, ClientSettings, ClientStatus, EventReceiver, FanoutSink, HandleKey, Limit, SinkConfig, SinkEvent,
    StreamHandle, SyncMethod,
};
use mio::net::UnixStream;

fn pair() -> (UnixStream, StdUnixStream) {
    let (ours, theirs) = StdUnixStream::pair().unwrap();
    ours.set_nonblocking(true).unwrap();
    theirs.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    (UnixStream::from_std(ours), theirs)
}

fn next_event(rx: &mut EventReceiver<UnixStream>) -> SinkEvent<UnixStream> {
    tokio_test::block_on(async { tokio::time::timeout(Duration::from_secs(5), rx.recv()).await })
        .expect("timed out waiting for sink event")
        .expect("event channel closed")
}

/// Wait for the removal of `key`, returning its status
fn wait_removed(rx: &mut EventReceiver<UnixStream>, key: HandleKey) -> (ClientStatus, UnixStream) {
    let mut status = None;
    loop {
        match next_event(rx) {
            SinkEvent::ClientRemoving { key: k, status: s, .. } if k == key => status = Some(s),
            SinkEvent::HandleReleased { key: k, handle } if k == key => {
                return (status.expect("removal announced before release"), handle);
            }
            _ => {}
        }
    }
}

fn read_n(stream: &mut StdUnixStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    stream.read_exact(&mut buf).unwrap();
    buf
}

#[test]
fn test_delivers_to_every_client() {
    let (sink, mut rx) = FanoutSink::start(SinkConfig::default()).unwrap();
    let (a, mut peer_a) = pair();
    let (b, mut peer_b) = pair();
    let (key_a, key_b) = (a.key(), b.key());

    sink.attach(a).unwrap();
    sink.attach(b).unwrap();
    assert!(matches!(next_event(&mut rx), SinkEvent::ClientAdded { key } if key == key_a));
    assert!(matches!(next_event(&mut rx), SinkEvent::ClientAdded { key } if key == key_b));

    sink.push(Chunk::header(&b"HDR:"[..])).unwrap();
    for payload in [&b"one;"[..], &b"two;"[..], &b"three;"[..]] {
        sink.push(Chunk::new(payload)).unwrap();
    }

    let expected = b"HDR:one;two;three;";
    assert_eq!(read_n(&mut peer_a, expected.len()), expected);
    assert_eq!(read_n(&mut peer_b, expected.len()), expected);

    let stats = sink.client_stats(key_a).unwrap();
    assert_eq!(stats.bytes_sent, expected.len() as u64);
    assert_eq!(sink.stats().bytes_to_serve, 14);
}

#[test]
fn test_peer_close_releases_handle() {
    let (sink, mut rx) = FanoutSink::start(SinkConfig::default()).unwrap();
    let (handle, peer) = pair();
    let key = handle.key();

    sink.attach(handle).unwrap();
    drop(peer);

    let (status, _handle) = wait_removed(&mut rx, key);
    assert_eq!(status, ClientStatus::Closed);
    assert_eq!(sink.client_count(), 0);
}

#[test]
fn test_detach_returns_handle() {
    let (sink, mut rx) = FanoutSink::start(SinkConfig::default()).unwrap();
    let (handle, _peer) = pair();
    let key = handle.key();

    sink.attach(handle).unwrap();
    assert!(sink.detach(key));

    let (status, handle) = wait_removed(&mut rx, key);
    assert_eq!(status, ClientStatus::Removed);
    assert_eq!(handle.key(), key);

    // The handle can be attached again once released
    sink.attach(handle).unwrap();
    assert_eq!(sink.client_count(), 1);
}

#[test]
fn test_slow_client_removed() {
    let config = SinkConfig::default().max(Limit::Buffers(3));
    let (sink, mut rx) = FanoutSink::start(config).unwrap();
    let (slow, _peer) = pair();
    let key = slow.key();
    sink.attach(slow).unwrap();

    // Far more than a socket buffer holds, and the peer never reads
    for _ in 0..16 {
        sink.push(Chunk::new(vec![0u8; 256 * 1024])).unwrap();
    }

    let (status, _handle) = wait_removed(&mut rx, key);
    assert_eq!(status, ClientStatus::Slow);
}

#[test]
fn test_late_joiner_starts_at_keyframe() {
    let config = SinkConfig::default()
        .sync_method(SyncMethod::LatestKeyframe)
        .retain_min(None, None, Some(8));
    let (sink, _rx) = FanoutSink::start(config).unwrap();

    sink.push(Chunk::new(&b"a;"[..])).unwrap();
    sink.push(Chunk::sync_point(&b"K;"[..])).unwrap();
    sink.push(Chunk::new(&b"b;"[..])).unwrap();

    let (late, mut peer) = pair();
    sink.attach_with(late, ClientSettings::new(SyncMethod::LatestKeyframe)).unwrap();
    sink.push(Chunk::new(&b"c;"[..])).unwrap();

    assert_eq!(read_n(&mut peer, 6), b"K;b;c;");
}

#[test]
fn test_flush_detach_drains_then_releases() {
    let (sink, mut rx) = FanoutSink::start(SinkConfig::default()).unwrap();
    let (handle, mut peer) = pair();
    let key = handle.key();
    sink.attach(handle).unwrap();

    sink.push(Chunk::new(&b"x;"[..])).unwrap();
    assert_eq!(read_n(&mut peer, 2), b"x;");

    assert!(sink.detach_flush(key));
    let (status, _handle) = wait_removed(&mut rx, key);
    assert_eq!(status, ClientStatus::Removed);
}
