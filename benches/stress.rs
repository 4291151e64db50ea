use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use tokio_postgres::{Config, NoTls};
use ulid::Ulid;

const DAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

const SLOTS: [&str; 13] = [
    "08:00", "09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00", "17:00",
    "18:00", "19:00", "20:00",
];

async fn connect(host: &str, port: u16) -> tokio_postgres::Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname(format!("bench_{}", Ulid::new()))
        .user("tutorhub")
        .password("tutorhub");

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

struct Marketplace {
    tutor: Ulid,
    parent: Ulid,
    child: Ulid,
}

/// Seed one tenant: a tutor bookable every day 08:00-20:00, one parent, one
/// child.
async fn seed(client: &tokio_postgres::Client) -> Marketplace {
    let tutor = Ulid::new();
    let parent = Ulid::new();
    let child = Ulid::new();

    client
        .batch_execute(&format!(
            "INSERT INTO tutors (id, name, hourly_rate, subjects) VALUES ('{tutor}', 'Bench Tutor', 60, 'Math')"
        ))
        .await
        .unwrap();
    let slots = SLOTS.join(",");
    for day in DAYS {
        client
            .batch_execute(&format!(
                "INSERT INTO availability (tutor_id, day, slots) VALUES ('{tutor}', '{day}', '{slots}')"
            ))
            .await
            .unwrap();
    }
    client
        .batch_execute(&format!(
            "INSERT INTO parents (id, name) VALUES ('{parent}', 'Bench Parent')"
        ))
        .await
        .unwrap();
    client
        .batch_execute(&format!(
            "INSERT INTO children (id, parent_id, name) VALUES ('{child}', '{parent}', 'Bench Child')"
        ))
        .await
        .unwrap();

    Marketplace { tutor, parent, child }
}

/// Future booking date for iteration `i` — cycles over the next 30 days.
fn booking_date(i: usize) -> NaiveDate {
    chrono::Local::now().date_naive() + Days::new(1 + (i as u64 % 30))
}

fn insert_booking_sql(m: &Marketplace, i: usize) -> String {
    format!(
        "INSERT INTO bookings (tutor_id, parent_id, child_id, subject, date, time, duration) \
         VALUES ('{}', '{}', '{}', 'Math', '{}', '{}', 60)",
        m.tutor,
        m.parent,
        m.child,
        booking_date(i),
        SLOTS[i % SLOTS.len()],
    )
}

async fn phase1_sequential(host: &str, port: u16) {
    let client = connect(host, port).await;
    let m = seed(&client).await;

    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let t = Instant::now();
        client.batch_execute(&insert_booking_sql(&m, i)).await.unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("booking write latency", &mut latencies);
}

async fn phase2_concurrent(host: &str, port: u16) {
    let n_tasks = 10;
    let n_per_task = 200;

    let start = Instant::now();
    let mut handles = Vec::new();

    for _ in 0..n_tasks {
        let host = host.to_string();
        handles.push(tokio::spawn(async move {
            // Each task uses its own tenant (unique dbname from connect())
            let client = connect(&host, port).await;
            let m = seed(&client).await;
            for i in 0..n_per_task {
                client.batch_execute(&insert_booking_sql(&m, i)).await.unwrap();
            }
        }));
    }

    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} bookings = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_reads_under_write_load(host: &str, port: u16) {
    // Writer tasks: continuously add bookings in the background
    let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for _ in 0..5 {
        let host = host.to_string();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let m = seed(&client).await;
            let mut i = 0usize;
            while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                let _ = client.batch_execute(&insert_booking_sql(&m, i)).await;
                i += 1;
            }
        }));
    }

    // Reader tasks: list their tenant's bookings and measure latency
    let n_readers = 10;
    let reads_per_reader = 500;
    let mut reader_handles = Vec::new();

    for _ in 0..n_readers {
        let host = host.to_string();
        reader_handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let m = seed(&client).await;
            for i in 0..100 {
                client.batch_execute(&insert_booking_sql(&m, i)).await.unwrap();
            }

            let mut latencies = Vec::with_capacity(reads_per_reader);
            for _ in 0..reads_per_reader {
                let t = Instant::now();
                client
                    .batch_execute(&format!(
                        "SELECT * FROM bookings WHERE tutor_id = '{}' AND status = 'pending'",
                        m.tutor
                    ))
                    .await
                    .unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.unwrap());
    }

    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("booking listing query", &mut all_latencies);
}

async fn phase4_transition_latency(host: &str, port: u16) {
    let client = connect(host, port).await;
    let m = seed(&client).await;

    // Create bookings, capturing ids
    let n = 1000;
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let rows = client
            .simple_query(&format!("{} RETURNING *", insert_booking_sql(&m, i)))
            .await
            .unwrap();
        for row in rows {
            if let tokio_postgres::SimpleQueryMessage::Row(row) = row {
                ids.push(row.get(0).unwrap().to_string());
            }
        }
    }

    // Approve them all, measuring transition latency
    let mut latencies = Vec::with_capacity(ids.len());
    for id in &ids {
        let t = Instant::now();
        client
            .batch_execute(&format!(
                "UPDATE bookings SET action = 'approve' WHERE id = '{id}' AND actor = 'tutor'"
            ))
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }

    print_latency("transition latency", &mut latencies);
}

async fn phase5_connection_storm(host: &str, port: u16) {
    let n_conns = 50;
    let ops_per_conn = 10;

    let start = Instant::now();
    let mut handles = Vec::new();
    let success = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

    for _ in 0..n_conns {
        let host = host.to_string();
        let success = success.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let m = seed(&client).await;
            for i in 0..ops_per_conn {
                client.batch_execute(&insert_booking_sql(&m, i)).await.unwrap();
            }
            success.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    let elapsed = start.elapsed();
    let ok = success.load(std::sync::atomic::Ordering::Relaxed);
    println!(
        "  {n_conns} connections, {ops_per_conn} ops each: {ok}/{n_conns} succeeded in {:.2}s",
        elapsed.as_secs_f64()
    );
}

#[tokio::main]
async fn main() {
    let host = std::env::var("TUTORHUB_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("TUTORHUB_PORT")
        .unwrap_or_else(|_| "5433".into())
        .parse()
        .expect("invalid TUTORHUB_PORT");

    println!("=== tutorhub stress benchmark ===");
    println!("target: {host}:{port}\n");

    // Each phase uses its own tenant (unique dbname) to avoid interference

    println!("[phase 1] sequential booking throughput");
    phase1_sequential(&host, port).await;

    println!("\n[phase 2] concurrent booking throughput");
    phase2_concurrent(&host, port).await;

    println!("\n[phase 3] listing latency under write load");
    phase3_reads_under_write_load(&host, port).await;

    println!("\n[phase 4] transition latency");
    phase4_transition_latency(&host, port).await;

    println!("\n[phase 5] connection storm");
    phase5_connection_storm(&host, port).await;

    println!("\n=== benchmark complete ===");
}
