use std::env;
use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use async_trait::async_trait;

use agentroom::event::{FanoutHandler, RoomEvent, RoomEventHandler};
use agentroom::message::MessageKind;
use agentroom::provider::ProviderRegistry;
use agentroom::room::{ChatRoom, StepOptions};
use agentroom::transcript::{load_transcript, TranscriptWriter};
use agentroom::{load_roster, RoomConfig};

// Run from the root folder of the repo as follows:
// OPEN_AI_SECRET=... XAI_API_KEY=... cargo run --example room_cli -- demos/roster.json
//
// Options:
//   --config <file.json>      room config (defaults otherwise)
//   --transcript <file.md>    where to write the transcript (default: room.md)
//   --resume <file.md>        continue a previous transcript
//   --free                    auto-paced mode; Ctrl-C stops the room

struct Printer;

#[async_trait]
impl RoomEventHandler for Printer {
    async fn on_event(&self, event: &RoomEvent) {
        match event {
            RoomEvent::Thinking { agent, .. } => {
                print!("{}: ", agent);
            }
            RoomEvent::StreamToken { chunk, .. } => {
                print!("{}", chunk);
            }
            RoomEvent::StreamDone { .. } => {
                println!();
            }
            RoomEvent::Message(msg) => match msg.kind {
                // Already printed through the stream.
                MessageKind::Chat => {}
                MessageKind::Join => {
                    let labels = match (&msg.provider, &msg.model) {
                        (Some(p), Some(m)) => format!(" [{}/{}]", p, m),
                        _ => String::new(),
                    };
                    println!("  -> {} joined{}: {}", msg.agent, labels, msg.content);
                }
                MessageKind::Leave => println!("  <- {}", msg.content),
                MessageKind::System => println!("  * {}", msg.content),
                MessageKind::User => println!("{}: {}", msg.agent, msg.content),
            },
        }
        let _ = io::stdout().flush();
    }
}

struct Options {
    roster: String,
    config: Option<String>,
    transcript: String,
    resume: Option<String>,
    free: bool,
}

fn parse_args() -> Result<Options, Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let mut options = Options {
        roster: String::new(),
        config: None,
        transcript: "room.md".to_string(),
        resume: None,
        free: false,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => options.config = args.next(),
            "--transcript" => {
                options.transcript = args.next().ok_or("--transcript needs a path")?
            }
            "--resume" => options.resume = args.next(),
            "--free" => options.free = true,
            other => options.roster = other.to_string(),
        }
    }
    if options.roster.is_empty() {
        return Err("usage: room_cli <roster.json> [--config c.json] [--transcript t.md] [--resume t.md] [--free]".into());
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    agentroom::init_logger();

    let options = parse_args()?;
    let config = match &options.config {
        Some(path) => RoomConfig::from_json_file(path)?,
        None => RoomConfig::default(),
    };
    let agents = load_roster(&options.roster)?;
    let registry = ProviderRegistry::from_env();
    println!("Providers available: {:?}", registry.kinds());

    let (room, writer) = match &options.resume {
        Some(path) => {
            let transcript = load_transcript(path)?;
            let room = ChatRoom::resume(config.clone(), agents, &registry, transcript)?;
            (room, TranscriptWriter::append(path).await?)
        }
        None => {
            let room = ChatRoom::new(config.clone(), agents, &registry)?;
            let writer = TranscriptWriter::create(&options.transcript, &config.topic).await?;
            (room, writer)
        }
    };
    println!("Writing transcript to {}", writer.path().display());

    let handler = FanoutHandler::new()
        .with_handler(Arc::new(Printer))
        .with_handler(Arc::new(writer));
    let mut room = room.with_event_handler(Arc::new(handler));
    room.open().await?;

    if options.free {
        run_free(&mut room).await;
    } else {
        run_governed(&mut room).await?;
    }

    room.stop();
    println!("Room closed after {} turns.", room.turn_count());
    Ok(())
}

/// Auto-paced: step, wait, repeat until Ctrl-C.
async fn run_free(room: &mut ChatRoom) {
    let token = room.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    while room.is_running() {
        if let Some(next) = room.peek_next_speaker() {
            println!("  (up next, probably: {})", next);
        }
        room.step(StepOptions::default()).await;
        if !room.pause_for_turn().await {
            break;
        }
    }
}

/// Step-by-step: Enter runs a turn, anything else is said by the host.
async fn run_governed(room: &mut ChatRoom) -> Result<(), Box<dyn Error>> {
    println!("\nEnter = next turn, text = speak as host, /shuffle, /next, /quit");
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Ok(());
        }

        match line.trim() {
            "" => {
                room.step(StepOptions::default()).await;
            }
            "/quit" => return Ok(()),
            "/next" => println!("  candidates: {:?}", room.peek_candidates()),
            "/shuffle" => {
                room.shuffle().await?;
            }
            text => {
                room.inject_user_message(text).await;
            }
        }
    }
}
