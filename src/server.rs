use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::AirQualityAnalyzer;
use crate::reducer::ExecutionModel;

// --- OpCodes ---
pub const OP_REDUCE: u8 = 0x01;
pub const OP_SCORE: u8  = 0x02;
pub const OP_RECORD: u8 = 0x03;
pub const OP_COUNT: u8  = 0x04;

/// Largest request body accepted.
pub const MAX_BODY: usize = 65536;

/// Serves reductions over one shared analyzer.
///
/// Frame: `[opcode u8][body length u32 LE][body]`. All numbers in replies are
/// little-endian; indices are 0-based.
pub struct AirQualityServer {
    analyzer: AirQualityAnalyzer,
}

impl AirQualityServer {
    pub fn new(analyzer: AirQualityAnalyzer) -> Self {
        Self { analyzer }
    }

    pub async fn run(&self, addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr, "airq server listening");
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer)) => {
                    debug!(%peer, "client connected");
                    let analyzer = self.analyzer.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(socket, analyzer).await {
                            // Ignore expected disconnections to keep logs clean
                            if e.kind() != std::io::ErrorKind::UnexpectedEof {
                                warn!(%peer, error = %e, "client error");
                            }
                        }
                    });
                }
                Err(e) => error!(error = %e, "connection failed"),
            }
        }
    }
}

async fn handle_client(mut stream: TcpStream, analyzer: AirQualityAnalyzer) -> std::io::Result<()> {
    let mut buffer = vec![0u8; MAX_BODY];

    loop {
        // 1. Read OpCode
        let mut op_buf = [0u8; 1];
        if stream.read_exact(&mut op_buf).await.is_err() {
            return Ok(());
        }
        let op_code = op_buf[0];

        // 2. Read Length
        let mut len_buf = [0u8; 4];
        if stream.read_exact(&mut len_buf).await.is_err() {
            return Ok(());
        }
        let length = u32::from_le_bytes(len_buf) as usize;

        // 3. Read Body
        if length > buffer.len() {
            warn!(length, max = MAX_BODY, "payload too large, closing connection");
            return Ok(());
        }
        stream.read_exact(&mut buffer[..length]).await?;
        let payload = &buffer[..length];

        let mut writer = BufWriter::new(&mut stream);

        // 4. Process Command
        match op_code {
            OP_REDUCE => handle_reduce(&mut writer, payload, &analyzer).await?,
            OP_SCORE  => handle_score(&mut writer, payload, &analyzer).await?,
            OP_RECORD => handle_record(&mut writer, payload, &analyzer).await?,
            OP_COUNT  => handle_count(&mut writer, &analyzer).await?,
            _ => {
                warn!(op_code, "unknown opcode, closing connection");
                return Ok(());
            }
        }
        writer.flush().await?;
    }
}

async fn write_error<W: AsyncWriteExt + Unpin>(writer: &mut W, message: &str) -> std::io::Result<()> {
    writer.write_all(b"ER").await?;
    writer.write_all(&(message.len() as u32).to_le_bytes()).await?;
    writer.write_all(message.as_bytes()).await
}

fn read_index(data: &[u8]) -> Option<usize> {
    let bytes: [u8; 8] = data.try_into().ok()?;
    usize::try_from(u64::from_le_bytes(bytes)).ok()
}

async fn handle_reduce<W: AsyncWriteExt + Unpin>(writer: &mut W, data: &[u8], analyzer: &AirQualityAnalyzer) -> std::io::Result<()> {
    // Protocol: [Workers u32 (4b)]
    let workers = match <[u8; 4]>::try_from(data) {
        Ok(bytes) => u32::from_le_bytes(bytes) as usize,
        Err(_) => return write_error(writer, "REDUCE expects a 4-byte worker count").await,
    };

    // CPU-bound pass; keep it off the async workers.
    let analyzer = analyzer.clone();
    let res = tokio::task::spawn_blocking(move || analyzer.reduce(ExecutionModel::SharedMemory, workers)).await;

    match res {
        Ok(Ok(run)) => {
            let r = run.result;
            writer.write_all(b"OK").await?;
            writer.write_all(&r.best_score.to_le_bytes()).await?;
            writer.write_all(&(r.best_index as u64).to_le_bytes()).await?;
            writer.write_all(&r.worst_score.to_le_bytes()).await?;
            writer.write_all(&(r.worst_index as u64).to_le_bytes()).await?;
            writer.write_all(&(run.elapsed.as_nanos() as u64).to_le_bytes()).await?;
        }
        Ok(Err(e)) => write_error(writer, &e.to_string()).await?,
        Err(e) => {
            error!(error = %e, "reduction task failed");
            write_error(writer, "reduction task failed").await?;
        }
    }
    Ok(())
}

async fn handle_score<W: AsyncWriteExt + Unpin>(writer: &mut W, data: &[u8], analyzer: &AirQualityAnalyzer) -> std::io::Result<()> {
    match read_index(data).and_then(|i| analyzer.score_of(i)) {
        Some(score) => {
            writer.write_all(&[1u8]).await?; // Found
            writer.write_all(&score.to_le_bytes()).await?;
        }
        None => writer.write_all(&[0u8]).await?, // Not Found
    }
    Ok(())
}

async fn handle_record<W: AsyncWriteExt + Unpin>(writer: &mut W, data: &[u8], analyzer: &AirQualityAnalyzer) -> std::io::Result<()> {
    match read_index(data).and_then(|i| analyzer.record(i)) {
        Some(record) => {
            writer.write_all(&[1u8]).await?;
            for value in record.attributes() {
                writer.write_all(&value.to_le_bytes()).await?;
            }
        }
        None => writer.write_all(&[0u8]).await?,
    }
    Ok(())
}

async fn handle_count<W: AsyncWriteExt + Unpin>(writer: &mut W, analyzer: &AirQualityAnalyzer) -> std::io::Result<()> {
    writer.write_all(&(analyzer.records().len() as u64).to_le_bytes()).await
}
