//! TCP fan-out example
//!
//! Generates a synthetic stream (a header, then one frame every 40ms with a
//! keyframe every 25 frames) and serves it to every TCP client that connects.
//!
//! Run with: cargo run --example tcp_fanout [BIND_ADDR] [SYNC_METHOD]
//!
//! Examples:
//!   cargo run --example tcp_fanout                              # 127.0.0.1:9000, latest-keyframe
//!   cargo run --example tcp_fanout 0.0.0.0:9001 burst-keyframe
//!
//! Then connect a few readers:
//!   nc localhost 9000 | xxd | head

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use fanout_rs::{Chunk, FanoutSink, Limit, RecoverPolicy, SinkConfig, SinkEvent, SyncMethod};
use mio::net::TcpStream;
use tokio::net::TcpListener;

const FRAME_INTERVAL: Duration = Duration::from_millis(40);
const KEYFRAME_INTERVAL: u64 = 25;

fn print_usage() {
    eprintln!("Usage: tcp_fanout [BIND_ADDR] [SYNC_METHOD]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR      Address to bind to (default: 127.0.0.1:9000)");
    eprintln!("  SYNC_METHOD    latest | next-keyframe | latest-keyframe | burst |");
    eprintln!("                 burst-keyframe | burst-with-keyframe (default: latest-keyframe)");
}

/// One synthetic frame: sequence number, keyframe flag, padding
fn frame(seq: u64) -> Chunk {
    let keyframe = seq % KEYFRAME_INTERVAL == 0;
    let mut buf = BytesMut::with_capacity(1024);
    buf.put_u64(seq);
    buf.put_u8(keyframe as u8);
    buf.put_bytes(if keyframe { b'K' } else { b'.' }, 1015);

    let mut chunk = Chunk::new(buf.freeze()).with_timestamp(FRAME_INTERVAL * seq as u32);
    chunk.is_sync_point = keyframe;
    chunk
}

/// Accept TCP clients and hand them to the sink
async fn accept_loop(listener: TcpListener, sink: Arc<FanoutSink<TcpStream>>) {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!(error = %e, "Failed to accept connection");
                continue;
            }
        };

        let stream = match socket.into_std() {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "Failed to take socket from runtime");
                continue;
            }
        };
        if let Err(e) = stream.set_nonblocking(true).and_then(|_| stream.set_nodelay(true)) {
            tracing::warn!(peer = %peer, error = %e, "Failed to configure socket");
            continue;
        }

        if let Err(e) = sink.attach(TcpStream::from_std(stream)) {
            tracing::warn!(peer = %peer, error = %e, "Attach failed");
            continue;
        }
        tracing::info!(peer = %peer, "Reader connected");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr: SocketAddr = args.get(1).map(String::as_str).unwrap_or("127.0.0.1:9000").parse()?;
    let sync_method: SyncMethod = match args.get(2) {
        Some(name) => name.parse()?,
        None => SyncMethod::LatestKeyframe,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fanout_rs=debug".parse()?)
                .add_directive("tcp_fanout=info".parse()?),
        )
        .init();

    let config = SinkConfig::default()
        .max(Limit::Time(Duration::from_secs(10)))
        .soft_max(Limit::Time(Duration::from_secs(4)))
        .recover_policy(RecoverPolicy::ResyncKeyframe)
        .sync_method(sync_method)
        .burst(Some(Limit::Time(Duration::from_secs(1))), Some(Limit::Time(Duration::from_secs(3))))
        .retain_min(None, Some(Duration::from_secs(3)), None)
        .timeout(Duration::from_secs(30));

    let (sink, mut events) = FanoutSink::<TcpStream>::start(config)?;
    let sink = Arc::new(sink);

    // Removed clients come back here; dropping the handle closes the socket
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SinkEvent::ClientRemoving { key, status, stats } => {
                    println!(
                        "client {} removed ({}): {} bytes, {} chunks dropped",
                        key, status, stats.bytes_sent, stats.dropped_chunks
                    );
                }
                SinkEvent::Fatal { message } => {
                    eprintln!("sink failed: {}", message);
                    break;
                }
                _ => {}
            }
        }
    });

    let listener = TcpListener::bind(bind_addr).await?;
    println!("Serving on {} (sync: {})", bind_addr, sync_method);
    tokio::spawn(accept_loop(listener, Arc::clone(&sink)));

    sink.push(Chunk::header(&b"FANOUT-DEMO/1\n"[..]))?;

    let mut ticker = tokio::time::interval(FRAME_INTERVAL);
    let mut seq = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sink.push(frame(seq))?;
                seq += 1;
                if seq % 250 == 0 {
                    let stats = sink.stats();
                    tracing::info!(
                        clients = stats.clients,
                        queued = stats.queued_chunks,
                        served = stats.bytes_served,
                        "Progress"
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
