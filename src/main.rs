// Aura Engine: persistent runtime with time-travel debugging

mod exec;
mod program;
mod runtime;
mod ui;
mod value;

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exec::AuraExecutor;
use program::{BinOp, Expr, Program, Stmt, StmtKind};
use runtime::events::EventData;
use runtime::inspector::RuntimeInspector;
use runtime::AuraRuntime;
use ui::App;
use value::Value;

/// Demo program browsed by the debugger. A front end would normally build
/// this tree from source text; the engine itself does not parse.
fn demo_program() -> Program {
    let statements = vec![
        Stmt::new(
            StmtKind::Set {
                name: "greeting".to_string(),
                expr: Expr::text("hello from aura"),
            },
            Some(1),
            "set greeting to \"hello from aura\"",
        ),
        Stmt::new(
            StmtKind::Print(Expr::var("greeting")),
            Some(2),
            "print greeting",
        ),
        Stmt::new(
            StmtKind::Set {
                name: "counter".to_string(),
                expr: Expr::number(0.0),
            },
            Some(3),
            "set counter to 0",
        ),
        Stmt::new(
            StmtKind::FunctionDef {
                name: "announce".to_string(),
                body: vec![Stmt::new(
                    StmtKind::Print(Expr::text("the counter run is done")),
                    Some(5),
                    "print \"the counter run is done\"",
                )],
            },
            Some(4),
            "define announce",
        ),
        Stmt::new(
            StmtKind::Repeat {
                count: 5,
                body: vec![
                    Stmt::new(
                        StmtKind::Set {
                            name: "counter".to_string(),
                            expr: Expr::binary(
                                BinOp::Add,
                                Expr::var("counter"),
                                Expr::number(1.0),
                            ),
                        },
                        Some(7),
                        "set counter to counter + 1",
                    ),
                    Stmt::new(
                        StmtKind::Print(Expr::var("counter")),
                        Some(8),
                        "print counter",
                    ),
                ],
            },
            Some(6),
            "repeat 5 times",
        ),
        Stmt::new(
            StmtKind::If {
                condition: Expr::binary(BinOp::Ge, Expr::var("counter"), Expr::number(5.0)),
                body: vec![Stmt::new(
                    StmtKind::Print(Expr::text("all five iterations ran")),
                    Some(10),
                    "print \"all five iterations ran\"",
                )],
                else_body: vec![Stmt::new(
                    StmtKind::Print(Expr::text("stopped early")),
                    Some(12),
                    "print \"stopped early\"",
                )],
            },
            Some(9),
            "if counter >= 5",
        ),
        Stmt::new(
            StmtKind::Call {
                name: "announce".to_string(),
            },
            Some(13),
            "call announce",
        ),
    ];
    Program::new(statements)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut headless = false;
    let mut run_for = Duration::from_secs(3);

    for arg in &args[1..] {
        match arg.as_str() {
            "--headless" => headless = true,
            other => match other.parse::<u64>() {
                Ok(seconds) if headless => run_for = Duration::from_secs(seconds),
                _ => {
                    let program_name = args.first().map(|s| s.as_str()).unwrap_or("aura-engine");
                    eprintln!("Error: Unknown argument '{}'", other);
                    eprintln!();
                    eprintln!("Usage: {} [--headless [seconds]]", program_name);
                    eprintln!();
                    eprintln!("  (no args)              Open the interactive debugger");
                    eprintln!("  --headless             Run the demo for 3s, then dump state");
                    eprintln!("  --headless 10          Run the demo for 10s, then dump state");
                    std::process::exit(1);
                }
            },
        }
    }

    // Logging only in headless mode; the TUI owns the terminal
    if headless {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "aura_engine=info".into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let runtime = Arc::new(AuraRuntime::new());
    runtime.load_program(demo_program())?;

    // Pulse handler: counts firings and publishes the count as a variable.
    // Weak reference, otherwise the runtime would hold itself alive through
    // its own handler table.
    let pulses = Arc::new(AtomicU64::new(0));
    {
        let pulses = Arc::clone(&pulses);
        let weak = Arc::downgrade(&runtime);
        runtime.on("pulse", move |_event| {
            let count = pulses.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(runtime) = weak.upgrade() {
                runtime.set_variable("pulses", Value::Number(count as f64))?;
            }
            Ok(())
        });
    }
    runtime.schedule_interval("pulse", Duration::from_millis(500), EventData::default());

    // Run the program once so there is history to browse
    let mut executor = AuraExecutor;
    if let Err(e) = runtime.execute_once(&mut executor) {
        eprintln!("Runtime error: {}", e);
        eprintln!("Entering debugger with partial execution history...");
    }

    if headless {
        run_headless(&runtime, run_for)
    } else {
        run_tui(&runtime)
    }
}

/// Run the background loop for a fixed window, then dump everything.
fn run_headless(runtime: &Arc<AuraRuntime>, run_for: Duration) -> Result<(), Box<dyn std::error::Error>> {
    info!("headless mode: running for {:?}", run_for);
    runtime.start(false);
    thread::sleep(run_for);
    runtime.stop();

    let inspector = RuntimeInspector::new(runtime);
    println!("{}", inspector.format_full_state());
    println!();
    println!("=== Output ===");
    for line in runtime.output_lines() {
        println!("{}", line);
    }

    Ok(())
}

/// Run the interactive debugger until the user quits.
fn run_tui(runtime: &Arc<AuraRuntime>) -> Result<(), Box<dyn std::error::Error>> {
    runtime.start(false);

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create and run app
    let mut app = App::new(Arc::clone(runtime));
    let res = app.run(&mut terminal);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    runtime.stop();

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}
