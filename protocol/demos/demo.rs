//! Interactive CLI demo of two Hubs reconciling their message sets.
//!
//! Walks through signer delegation, writes on two independent Hubs,
//! snapshot comparison, one sync round in each direction, and a
//! revocation that propagates on the next round. The output uses ANSI
//! escape codes for colored, storytelling-style terminal rendering.
//!
//! Run with:
//!   cargo run --example demo --release
//!   RUST_LOG=hub_protocol=debug cargo run --example demo

use std::sync::Arc;
use std::time::Instant;

use hub_protocol::message::*;
use hub_protocol::sync::{SyncEngine, SyncId, TransportPeer};
use hub_protocol::{Hub, HubResult};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const BG_BLUE: &str = "\x1b[44m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn banner() {
    println!();
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}    HUB PROTOCOL  --  Two-Hub Sync Demo                             {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}    Version 0.1.0  |  CRDT stores + Merkle trie + BLAKE3            {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!();
}

fn section(num: u32, title: &str) {
    println!();
    println!(
        "{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]=============================================================={RESET}"
    );
    println!("{BOLD}{WHITE}  {title}{RESET}");
    println!(
        "{CYAN}------------------------------------------------------------------------{RESET}"
    );
}

fn subsection(text: &str) {
    println!("{DIM}{CYAN}  >> {text}{RESET}");
}

fn success(text: &str) {
    println!("{GREEN}  [OK] {text}{RESET}");
}

fn info(label: &str, value: &str) {
    println!("{WHITE}  {BOLD}{label}:{RESET} {YELLOW}{value}{RESET}");
}

fn timing(label: &str, elapsed: std::time::Duration) {
    let ms = elapsed.as_secs_f64() * 1000.0;
    println!("{DIM}{MAGENTA}  [{label}: {ms:.2} ms]{RESET}");
}

fn hub_row(name: &str, hub: &Hub, color: &str) {
    let trie = hub.sync_engine().trie();
    let root = hex::encode(trie.root_hash());
    println!(
        "  {color}{BOLD}{name:<8}{RESET}  {WHITE}{:>4}{RESET} {DIM}messages{RESET}  {DIM}root {}...{RESET}",
        trie.items(),
        &root[..16]
    );
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const CUSTODY: SignerKey = [0xC0; 32];
const APP_KEY: SignerKey = [0xA1; 32];

fn message(fid: Fid, timestamp: u32, body: MessageBody, signer: SignerKey) -> HubResult<Message> {
    Message::new(
        MessageData {
            fid,
            timestamp,
            body,
        },
        signer,
    )
}

fn cast(fid: Fid, timestamp: u32, text: &str) -> HubResult<Message> {
    message(
        fid,
        timestamp,
        MessageBody::CastAdd(CastAddBody {
            text: text.to_string(),
            embeds: Vec::new(),
            mentions: Vec::new(),
            parent: None,
        }),
        APP_KEY,
    )
}

fn peer(hub: &Hub) -> TransportPeer<Arc<SyncEngine>> {
    TransportPeer::new(Arc::clone(hub.sync_engine()))
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> HubResult<()> {
    // Library logs stay quiet unless RUST_LOG asks for them.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let demo_start = Instant::now();

    banner();

    // -----------------------------------------------------------------------
    // Step 1: Two Hubs
    // -----------------------------------------------------------------------

    section(1, "Bootstrapping two in-memory Hubs");
    let alpha = Hub::in_memory()?;
    let beta = Hub::in_memory()?;
    alpha.start()?;
    beta.start()?;
    success("Both Hubs running with empty stores and empty tries");

    // -----------------------------------------------------------------------
    // Step 2: Signer delegation
    // -----------------------------------------------------------------------

    section(2, "Delegating an app key");
    subsection("fid 1 and fid 2 authorize the same app key from their custody key...");
    for fid in [1, 2] {
        let grant = message(
            fid,
            10,
            MessageBody::SignerAdd(SignerBody { signer: APP_KEY }),
            CUSTODY,
        )?;
        alpha.submit_message(&grant)?;
        beta.submit_message(&grant)?;
    }
    success("Grants merged on both Hubs");

    // -----------------------------------------------------------------------
    // Step 3: Independent writes
    // -----------------------------------------------------------------------

    section(3, "Writing to each Hub independently");
    let t = Instant::now();
    for i in 0..40u32 {
        alpha.submit_message(&cast(1, 1_000 + i * 3, &format!("alpha says {}", i))?)?;
    }
    for i in 0..25u32 {
        beta.submit_message(&cast(2, 1_001 + i * 5, &format!("beta says {}", i))?)?;
    }
    let follow = message(
        2,
        2_000,
        MessageBody::FollowAdd(FollowBody { target_fid: 1 }),
        APP_KEY,
    )?;
    beta.submit_message(&follow)?;
    timing("66 merges", t.elapsed());

    println!();
    hub_row("alpha", &alpha, BLUE);
    hub_row("beta", &beta, GREEN);

    // -----------------------------------------------------------------------
    // Step 4: Snapshot comparison
    // -----------------------------------------------------------------------

    section(4, "Comparing snapshots");
    let ours = alpha.sync_engine().snapshot();
    let theirs = beta.sync_engine().snapshot();
    info("snapshot prefix", &String::from_utf8_lossy(&ours.prefix));
    let divergence = alpha
        .sync_engine()
        .trie()
        .get_divergence_prefix(&ours.prefix, &theirs.excluded_hashes);
    info("divergence prefix", &String::from_utf8_lossy(&divergence));
    info(
        "should sync",
        &alpha.sync_engine().should_sync(&theirs.excluded_hashes).to_string(),
    );

    // -----------------------------------------------------------------------
    // Step 5: Reconcile
    // -----------------------------------------------------------------------

    section(5, "Reconciling in both directions");
    let t = Instant::now();
    if let Some(stats) = alpha.sync_with_peer(&peer(&beta)).await? {
        info("alpha <- beta", &format!("{:?}", stats));
    }
    if let Some(stats) = beta.sync_with_peer(&peer(&alpha)).await? {
        info("beta <- alpha", &format!("{:?}", stats));
    }
    timing("two sync rounds", t.elapsed());

    println!();
    hub_row("alpha", &alpha, BLUE);
    hub_row("beta", &beta, GREEN);
    if alpha.sync_engine().trie().root_hash() == beta.sync_engine().trie().root_hash() {
        success("Roots match: both Hubs hold the same message set");
    }

    // -----------------------------------------------------------------------
    // Step 6: Revocation
    // -----------------------------------------------------------------------

    section(6, "Revoking fid 2's app key on beta");
    let revoke = message(
        2,
        3_000,
        MessageBody::SignerRemove(SignerBody { signer: APP_KEY }),
        CUSTODY,
    )?;
    let events = beta.submit_message(&revoke)?;
    let revoked = events.iter().filter(|e| e.kind() == "revoke").count();
    info("messages revoked on beta", &revoked.to_string());

    if let Some(stats) = alpha.sync_with_peer(&peer(&beta)).await? {
        info("alpha <- beta", &format!("{:?}", stats));
    }
    hub_row("alpha", &alpha, BLUE);
    hub_row("beta", &beta, GREEN);

    let leftover: Vec<SyncId> = alpha
        .engine()
        .casts()
        .get_adds_by_fid(2)?
        .iter()
        .map(SyncId::from_message)
        .collect();
    if leftover.is_empty() {
        success("The revocation reached alpha and took fid 2's casts with it");
    }

    alpha.stop().await?;
    beta.stop().await?;

    println!();
    timing("total demo", demo_start.elapsed());
    println!();
    Ok(())
}
