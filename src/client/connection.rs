//! Terminal and socket plumbing around [`ClientMachine`].
//!
//! A dedicated thread reads stdin and a reader task decodes responses; both
//! feed channels into one loop that owns the state machine and the socket's
//! write half, so transitions and writes never race.

use std::io::{BufRead, Write};

use anyhow::Context;
use log::{debug, info};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;

use super::client_state::{Action, ClientMachine};
use crate::args::Endpoint;
use crate::error::ProtocolError;
use crate::protocol::{Response, read_message, write_message};
use crate::terminal::NoEcho;

pub async fn run(endpoint: Endpoint) -> anyhow::Result<()> {
    let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
        .await
        .with_context(|| format!("failed to connect to {}:{}", endpoint.host, endpoint.port))?;
    info!("Connected to {}:{}", endpoint.host, endpoint.port);

    let (mut reader, mut writer) = stream.into_split();

    let (response_tx, mut responses) = mpsc::channel::<Result<Response, ProtocolError>>(16);
    tokio::spawn(async move {
        loop {
            let result = read_message(&mut reader).await;
            let failed = result.is_err();
            if response_tx.send(result).await.is_err() || failed {
                break;
            }
        }
    });

    let mut lines = spawn_input_thread();
    let mut machine = ClientMachine::new(endpoint.username);
    let mut no_echo: Option<NoEcho> = None;

    write_message(&mut writer, &machine.login_request())
        .await
        .context("failed to send login")?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.recv() => {
                if no_echo.take().is_some() {
                    println!();
                }
                let Some(line) = line else {
                    debug!("stdin closed");
                    shutdown(&mut machine, &mut writer).await;
                    break;
                };
                match machine.on_line(&line) {
                    Action::Send(request) => {
                        if let Err(e) = write_message(&mut writer, &request).await {
                            eprintln!("Network error: {e}");
                            break;
                        }
                    }
                    Action::Print(text) => print_flush(&text),
                    Action::Exit => {
                        shutdown(&mut machine, &mut writer).await;
                        break;
                    }
                    Action::Nothing => {}
                }
            }
            response = responses.recv() => match response {
                Some(Ok(response)) => {
                    let render = machine.on_response(&response);
                    print_flush(&render.text);
                    if let Some(prompt) = render.prompt {
                        print_flush(prompt);
                    }
                    if render.hide_input {
                        no_echo = NoEcho::enable().ok();
                    }
                }
                Some(Err(ProtocolError::Closed)) | None => {
                    eprintln!("Server closed the connection.");
                    break;
                }
                Some(Err(e)) => {
                    eprintln!("Network error: {e}");
                    break;
                }
            },
            _ = &mut ctrl_c => {
                println!();
                println!("Interrupted, shutting down...");
                shutdown(&mut machine, &mut writer).await;
                break;
            }
        }
    }

    drop(no_echo);
    println!("Client closed");
    Ok(())
}

/// Best effort: a peer that is already gone is not an error here.
async fn shutdown(machine: &mut ClientMachine, writer: &mut OwnedWriteHalf) {
    let Some(request) = machine.begin_exit() else {
        return;
    };
    if let Err(e) = write_message(writer, &request).await {
        debug!("EXIT notification not delivered: {}", e);
    }
    let _ = writer.shutdown().await;
}

fn spawn_input_thread() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn print_flush(text: &str) {
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}
