use async_stream::stream;
use colored::*;
use futures::stream::Stream;
use futures::stream::StreamExt;
use quill_log::MemoryStore;
use quill_server::{
    AllowAll, ClientReplica, ConnectionId, Coordinator, ServerConfig, ServerMessage,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

const DOC: &str = "stress";

/// Statistics collected during stress testing
#[derive(Clone, Debug)]
pub struct StressTestStats {
    pub num_clients: usize,
    pub edits_per_client: usize,
    pub revisions: i64,
    pub final_len: usize,
    pub total_time: Duration,
    pub edits_per_second: f64,
    pub converged: bool,
}

impl StressTestStats {
    pub fn print(&self) {
        let verdict = if self.converged {
            "converged".bright_green().bold()
        } else {
            "DIVERGED".bright_red().bold()
        };
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║              Stress Test Statistics                         ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Clients:                   {:>30} ║", self.num_clients);
        println!("║  Edits per Client:          {:>30} ║", self.edits_per_client);
        println!("║  Revisions Committed:       {:>30} ║", self.revisions);
        println!("║  Final Length (chars):      {:>30} ║", self.final_len);
        println!("║  Total Time:                {:>29}s ║", format!("{:.3}", self.total_time.as_secs_f64()));
        println!("║  Edits/Second:              {:>30.0} ║", self.edits_per_second);
        println!("╚════════════════════════════════════════════════════════════╝");
        println!("  Result: {}", verdict);
    }
}

/// One random local edit, positioned relative to the current text length.
#[derive(Clone, Debug)]
struct EditAction {
    position: f64,
    remove: usize,
    insert: String,
}

/// Generator of random edits for one client
fn edit_generator(seed: u64, num_edits: usize) -> impl Stream<Item = EditAction> {
    stream! {
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..num_edits {
            let insert: String = (0..rng.gen_range(0..4))
                .map(|_| ['a', 'b', ' ', '\n'][rng.gen_range(0..4)])
                .collect();
            yield EditAction {
                position: rng.gen_range(0.0..1.0),
                remove: rng.gen_range(0..3),
                insert,
            };
        }
    }
}

struct StressClient {
    connection: ConnectionId,
    inbox: UnboundedReceiver<ServerMessage>,
    replica: ClientReplica,
}

impl StressClient {
    /// Apply every queued server message and send buffered edits.
    async fn pump(&mut self, coordinator: &Coordinator) -> quill_server::Result<bool> {
        let mut progressed = false;
        while let Ok(message) = self.inbox.try_recv() {
            self.replica.receive(&message)?;
            progressed = true;
        }
        if let Some(edit) = self.replica.flush()? {
            coordinator.handle_message(self.connection, edit).await;
            progressed = true;
        }
        Ok(progressed)
    }
}

async fn run_client(
    coordinator: Arc<Coordinator>,
    mut client: StressClient,
    seed: u64,
    num_edits: usize,
) -> quill_server::Result<StressClient> {
    let mut edits = Box::pin(edit_generator(seed, num_edits));
    let mut made = 0;

    while let Some(action) = edits.next().await {
        let len = client.replica.text().chars().count();
        let start = ((len - 1) as f64 * action.position) as usize;
        client.replica.local_edit(start, action.remove, &action.insert)?;
        client.pump(&coordinator).await?;

        made += 1;
        if made % 10 == 0 {
            tokio::task::yield_now().await;
        }
    }

    // Wait for the last edit in flight to be acknowledged.
    while !client.replica.is_settled() {
        let Some(message) = client.inbox.recv().await else {
            break;
        };
        client.replica.receive(&message)?;
        client.pump(&coordinator).await?;
    }
    Ok(client)
}

/// Concurrent clients editing one document through an in-process
/// coordinator. Every replica must match the document head at the end.
pub async fn stress_test_sessions(
    num_clients: usize,
    edits_per_client: usize,
) -> quill_server::Result<StressTestStats> {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║        Session Stress Test (Async)                         ║");
    println!("║  Clients: {} | Edits/Client: {}", num_clients, edits_per_client);
    println!("╚════════════════════════════════════════════════════════════╝");

    let coordinator = Arc::new(Coordinator::new(
        ServerConfig::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(AllowAll::new()),
    ));
    let start = Instant::now();

    println!("\n[Phase 1/2] Joining and editing...");

    let mut handles = Vec::with_capacity(num_clients);
    for idx in 0..num_clients {
        let (connection, inbox) = coordinator.connect();
        let replica = ClientReplica::new(DOC, format!("client-{}", idx));
        coordinator
            .handle_message(connection, replica.join_message())
            .await;
        let client = StressClient {
            connection,
            inbox,
            replica,
        };
        handles.push(tokio::spawn(run_client(
            coordinator.clone(),
            client,
            idx as u64,
            edits_per_client,
        )));
    }

    let mut clients = Vec::with_capacity(num_clients);
    for handle in handles {
        match handle.await {
            Ok(client) => clients.push(client?),
            Err(err) => tracing::error!(error = %err, "client task failed"),
        }
    }

    println!("[Phase 1/2] ✓ Completed");
    println!("[Phase 2/2] Draining deltas...");

    loop {
        let mut progressed = false;
        for client in clients.iter_mut() {
            progressed |= client.pump(&coordinator).await?;
        }
        if !progressed {
            break;
        }
    }

    let (text, head) = coordinator.snapshot(DOC).await?;
    let converged = clients.len() == num_clients
        && clients
            .iter()
            .all(|client| client.replica.text() == text && client.replica.base_rev() == head);

    let total_time = start.elapsed();
    let edits_per_second = (num_clients * edits_per_client) as f64 / total_time.as_secs_f64();

    println!("[Phase 2/2] ✓ Completed");

    Ok(StressTestStats {
        num_clients,
        edits_per_client,
        revisions: head + 1,
        final_len: text.chars().count(),
        total_time,
        edits_per_second,
        converged,
    })
}

/// Run the session stress test at increasing client counts.
pub async fn stress_test_scaling(max_clients: usize, step_size: usize) -> quill_server::Result<()> {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║      Scaling Analysis - Throughput vs Clients              ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let mut current_clients = step_size;
    while current_clients <= max_clients {
        let stats = stress_test_sessions(current_clients, 50).await?;
        stats.print();
        current_clients += step_size;
    }
    Ok(())
}
