use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use serial_assistant::config::{AppConfig, CONFIG_FILE};
use serial_assistant::error::Result;
use serial_assistant::serial::port::{COMMON_BAUD_RATES, ParitySetting, StopBitsSetting};
use serial_assistant::serial::*;
use serial_assistant::terminal::{ConsoleCommand, StdoutSink};

/// Serial port terminal with HEX and GBK/UTF-8 text views
#[derive(Debug, Parser)]
#[command(name = "serial_assistant", version, about)]
struct Cli {
    /// Serial device to open, e.g. /dev/ttyUSB0 or COM3
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Data bits (5-8)
    #[arg(long)]
    data_bits: Option<u8>,

    /// Stop bits: 1, 1.5 or 2
    #[arg(long)]
    stop_bits: Option<StopBitsSetting>,

    /// Parity: none, odd or even
    #[arg(long)]
    parity: Option<ParitySetting>,

    /// Receive view: hex or text
    #[arg(long)]
    rx: Option<DisplayMode>,

    /// Receive charset: gbk or utf8
    #[arg(long)]
    rx_enc: Option<Charset>,

    /// Send input format: hex or text
    #[arg(long)]
    tx: Option<DisplayMode>,

    /// Send charset: gbk or utf8
    #[arg(long)]
    tx_enc: Option<Charset>,

    /// Append CR LF to every line sent in text mode
    #[arg(long)]
    crlf: bool,

    /// Prefix received lines with the local time
    #[arg(short, long)]
    timestamp: bool,

    /// List available serial ports and exit
    #[arg(short, long)]
    list: bool,

    /// Configuration file
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Write the effective settings back to the configuration file
    #[arg(long)]
    save: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = &self.port {
            config.port.port_name = port.clone();
        }
        if let Some(baud) = self.baud {
            config.port.baud_rate = baud;
        }
        if let Some(data_bits) = self.data_bits {
            config.port.data_bits = data_bits;
        }
        if let Some(stop_bits) = self.stop_bits {
            config.port.stop_bits = stop_bits;
        }
        if let Some(parity) = self.parity {
            config.port.parity = parity;
        }
        if let Some(mode) = self.rx {
            config.receive.mode = mode;
        }
        if let Some(charset) = self.rx_enc {
            config.receive.charset = charset;
        }
        if let Some(mode) = self.tx {
            config.send.mode = mode;
        }
        if let Some(charset) = self.tx_enc {
            config.send.charset = charset;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.list {
        for name in list_ports()? {
            println!("{name}");
        }
        return Ok(());
    }

    let mut config = AppConfig::load_or_default(&cli.config);
    cli.apply(&mut config);
    if !COMMON_BAUD_RATES.contains(&config.port.baud_rate) {
        warn!("Unusual baud rate {}", config.port.baud_rate);
    }
    if cli.save {
        config.save(&cli.config)?;
    }

    let (worker, mut events) = PortWorker::open(&config.port)?;
    let mut session = Session::new(config.receive, config.send);
    let mut sink = StdoutSink::new(cli.timestamp);
    eprintln!("{}", status_line(&config.port, &session));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(PortEvent::Data(chunk)) => session.receive_into(&chunk, &mut sink),
                Some(PortEvent::Closed) | None => break,
                Some(PortEvent::Disconnected(reason)) => {
                    eprintln!("device disconnected: {reason}");
                    break;
                }
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match ConsoleCommand::parse(&line) {
                    Ok(ConsoleCommand::Quit) => break,
                    Ok(ConsoleCommand::Status) => eprintln!("{}", status_line(&config.port, &session)),
                    Ok(command) => {
                        if let Err(e) = apply_command(command, cli.crlf, &mut session, &worker).await {
                            eprintln!("{e}");
                        }
                    }
                    Err(e) => eprintln!("{e}"),
                },
                Ok(None) => {
                    info!("stdin closed, receive only");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {e}");
                    stdin_open = false;
                }
            },
            _ = &mut ctrl_c => break,
        }
    }

    let tail = session.flush();
    if !tail.is_empty() {
        sink.append(&tail);
    }
    worker.close().await;
    session.close();
    Ok(())
}

async fn apply_command(
    command: ConsoleCommand,
    crlf: bool,
    session: &mut Session,
    worker: &PortWorker,
) -> Result<()> {
    match command {
        ConsoleCommand::Send(mut line) => {
            if crlf && session.send_config().mode == DisplayMode::Text {
                line.push_str("\r\n");
            }
            if let Some(bytes) = session.prepare_send(&line) {
                worker.write(&bytes).await?;
            }
        }
        ConsoleCommand::SetReceiveMode(mode) => session.set_receive_mode(mode),
        ConsoleCommand::SetReceiveCharset(charset) => session.set_receive_charset(charset),
        ConsoleCommand::SetSendMode(mode) => session.set_send_mode(mode),
        ConsoleCommand::SetSendCharset(charset) => session.set_send_charset(charset),
        ConsoleCommand::Status | ConsoleCommand::Quit => {}
    }
    Ok(())
}

fn status_line(port: &PortSettings, session: &Session) -> String {
    let receive = session.receive_config();
    let send = session.send_config();
    format!(
        "[{}] rx {}/{} tx {}/{}",
        port.summary(),
        receive.mode,
        receive.charset,
        send.mode,
        send.charset
    )
}
