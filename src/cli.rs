use std::io::{self, BufRead, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use airq::config::DEFAULT_SERVER_ADDR;
use airq::model::{Record, ScoredResult, ATTRIBUTE_COUNT};
use airq::parser::{self, Command};
use airq::report;
use airq::server::{OP_COUNT, OP_RECORD, OP_REDUCE, OP_SCORE};

const DEFAULT_SWEEP: [usize; 3] = [1, 2, 4];

fn main() {
    let host = std::env::var("AIRQ_ADDR").unwrap_or_else(|_| DEFAULT_SERVER_ADDR.to_string());
    print_banner();

    match TcpStream::connect(&host) {
        Ok(_) => println!("[\u{2713}] Connected to airq server at {}!", host),
        Err(_) => {
            println!("[\u{2717}] Could not connect to server at {}.", host);
            println!("    Make sure to run 'cargo run --release -- serve' in another terminal.");
            return;
        }
    }
    println!("Type 'HELP' for supported commands or 'EXIT' to quit.\n");

    let stdin = io::stdin();
    let mut buffer = String::new();

    loop {
        print!("airq> ");
        if io::stdout().flush().is_err() { break; }
        buffer.clear();

        match stdin.lock().read_line(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if buffer.trim().is_empty() { continue; }

        match parser::parse_command(&buffer) {
            Ok(Command::Exit) => break,
            Ok(cmd) => {
                if let Err(e) = execute_command(&host, cmd) {
                    println!("[\u{26a0}\u{fe0f} Error] {}", e);
                }
            }
            Err(e) => {
                println!("[\u{2717} Syntax Error] {}", e);
                if buffer.to_uppercase().starts_with("REDUCE") {
                    println!("    \u{2139}\u{fe0f}  Hint: Try 'REDUCE WITH 4 WORKERS'");
                }
            }
        }
    }
}

fn print_banner() {
    println!("\n==================================================");
    println!("   airq CLI - Parallel Air Quality Analysis");
    println!("==================================================\n");
}

fn print_help() {
    println!("\n--- Available Commands ---");
    println!("1. REDUCE:  REDUCE WITH 4 WORKERS");
    println!("2. SWEEP:   SWEEP [1, 2, 4]");
    println!("3. SCORE:   SCORE HOUR 10");
    println!("4. RECORD:  RECORD HOUR 4");
    println!("5. COUNT:   COUNT");
    println!("6. EXIT:    Quit\n");
}

fn execute_command(host: &str, cmd: Command) -> Result<(), String> {
    match cmd {
        Command::Help => { print_help(); Ok(()) },
        Command::Reduce { workers } => perform_reduce(host, workers),
        Command::Sweep { workers } => perform_sweep(host, &workers.unwrap_or_else(|| DEFAULT_SWEEP.to_vec())),
        Command::Score { hour } => perform_score(host, to_index(hour)?),
        Command::Record { hour } => perform_record(host, to_index(hour)?),
        Command::Count => perform_count(host),
        Command::Exit => Ok(()),
    }
}

fn to_index(hour: usize) -> Result<usize, String> {
    hour.checked_sub(1).ok_or_else(|| "Hours start at 1.".to_string())
}

// --- NETWORK HANDLERS ---

fn request(host: &str, op: u8, body: &[u8]) -> Result<TcpStream, String> {
    let mut stream = TcpStream::connect(host).map_err(|e| e.to_string())?;
    stream.write_all(&[op]).map_err(|e| e.to_string())?;
    stream.write_all(&(body.len() as u32).to_le_bytes()).map_err(|e| e.to_string())?;
    stream.write_all(body).map_err(|e| e.to_string())?;
    Ok(stream)
}

/// The wire carries worker counts as u32.
fn encode_workers(workers: usize) -> Result<[u8; 4], String> {
    u32::try_from(workers)
        .map(u32::to_le_bytes)
        .map_err(|_| format!("Worker count {} exceeds the protocol limit of {}.", workers, u32::MAX))
}

fn read_array<const N: usize>(stream: &mut TcpStream) -> Result<[u8; N], String> {
    let mut buf = [0u8; N];
    stream.read_exact(&mut buf).map_err(|e| e.to_string())?;
    Ok(buf)
}

fn read_f64(stream: &mut TcpStream) -> Result<f64, String> {
    Ok(f64::from_le_bytes(read_array::<8>(stream)?))
}

fn read_u64(stream: &mut TcpStream) -> Result<u64, String> {
    Ok(u64::from_le_bytes(read_array::<8>(stream)?))
}

struct RemoteRun {
    best: ScoredResult,
    worst: ScoredResult,
    elapsed: Duration,
}

fn remote_reduce(host: &str, workers: usize) -> Result<RemoteRun, String> {
    let mut stream = request(host, OP_REDUCE, &encode_workers(workers)?)?;

    let status = read_array::<2>(&mut stream)?;
    if &status != b"OK" {
        let len = u32::from_le_bytes(read_array::<4>(&mut stream)?) as usize;
        let mut message = vec![0u8; len];
        stream.read_exact(&mut message).map_err(|e| e.to_string())?;
        return Err(format!("Server Rejected Request: {}", String::from_utf8_lossy(&message)));
    }

    let best = ScoredResult::new(read_f64(&mut stream)?, read_u64(&mut stream)? as usize);
    let worst = ScoredResult::new(read_f64(&mut stream)?, read_u64(&mut stream)? as usize);
    let elapsed = Duration::from_nanos(read_u64(&mut stream)?);
    Ok(RemoteRun { best, worst, elapsed })
}

fn remote_record(host: &str, index: usize) -> Result<Option<Record>, String> {
    let mut stream = request(host, OP_RECORD, &(index as u64).to_le_bytes())?;
    let found = read_array::<1>(&mut stream)?;
    if found[0] != 1 {
        return Ok(None);
    }
    let mut attrs = [0.0; ATTRIBUTE_COUNT];
    for value in attrs.iter_mut() {
        *value = read_f64(&mut stream)?;
    }
    Ok(Some(Record::from_attributes(attrs)))
}

fn perform_reduce(host: &str, workers: usize) -> Result<(), String> {
    let run = remote_reduce(host, workers)?;
    let best_record = remote_record(host, run.best.index)?;
    let worst_record = remote_record(host, run.worst.index)?;

    println!("\nNumber of Workers: {}", workers);
    println!("Execution Time: {:.6} seconds\n", run.elapsed.as_secs_f64());
    print!("{}", report::extreme("BEST AIR QUALITY (LOWEST SCORE)", run.best, best_record.as_ref()));
    println!();
    print!("{}", report::extreme("WORST AIR QUALITY (HIGHEST SCORE)", run.worst, worst_record.as_ref()));
    println!();
    Ok(())
}

fn perform_sweep(host: &str, plan: &[usize]) -> Result<(), String> {
    println!("\nWorkers |  Elapsed      | Result");
    for &workers in plan {
        let run = remote_reduce(host, workers)?;
        println!("{}", report::sweep_row(workers, run.elapsed, run.best, run.worst));
    }
    println!();
    Ok(())
}

fn perform_score(host: &str, index: usize) -> Result<(), String> {
    let mut stream = request(host, OP_SCORE, &(index as u64).to_le_bytes())?;
    let found = read_array::<1>(&mut stream)?;
    if found[0] == 1 {
        println!("Hour {} Score: {:.2}", report::hour_of(index), read_f64(&mut stream)?);
    } else {
        println!("[\u{2717}] Hour {} Not Found.", report::hour_of(index));
    }
    Ok(())
}

fn perform_record(host: &str, index: usize) -> Result<(), String> {
    match remote_record(host, index)? {
        Some(record) => println!("Hour {}: {}", report::hour_of(index), report::describe_record(&record)),
        None => println!("[\u{2717}] Hour {} Not Found.", report::hour_of(index)),
    }
    Ok(())
}

fn perform_count(host: &str) -> Result<(), String> {
    let mut stream = request(host, OP_COUNT, &[])?;
    println!("Records: {}", read_u64(&mut stream)?);
    Ok(())
}
