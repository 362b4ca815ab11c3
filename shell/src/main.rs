use clap::Parser;
use vsh::{ExitStatus, Shell, VshError};
use vsh_config::VshConfig;

/// vsh - Interactive POSIX-like shell
#[derive(Parser, Debug)]
#[command(name = "vsh", version, about)]
struct Args {
    /// Execute command and exit
    #[arg(short = 'c')]
    command: Option<String>,

    /// Script file to execute line by line
    #[arg(short = 'f', long = "file")]
    script: Option<String>,

    /// Configuration file
    #[arg(long, env = "VSH_CONFIG")]
    config: Option<String>,

    /// Remaining arguments are executed as one pre-split command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => vsh_config::load_from_file(path),
        None => vsh_config::load(),
    }
    .unwrap_or_else(|e| {
        eprintln!("vsh: config: {e}");
        VshConfig::default()
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(config.logging.level.as_filter())
                }),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut shell = Shell::new();

    if let Some(command) = args.command {
        finish(shell.execute(&command));
    } else if let Some(script_path) = args.script {
        run_script(&mut shell, &script_path);
    } else if !args.args.is_empty() {
        finish(shell.execute_args(&args.args));
    } else {
        run_repl(&mut shell, &config.shell);
    }
}

fn finish(result: Result<ExitStatus, VshError>) -> ! {
    match result {
        Ok(status) => std::process::exit(status.code()),
        Err(VshError::Exit(code)) => std::process::exit(code),
        Err(e) => {
            eprintln!("vsh: {e}");
            std::process::exit(1);
        }
    }
}

fn run_script(shell: &mut Shell, path: &str) {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("vsh: cannot read '{path}': {e}");
            std::process::exit(1);
        }
    };

    let mut last = ExitStatus::SUCCESS;
    for line in content.lines() {
        match shell.execute(line) {
            Ok(status) => last = status,
            Err(VshError::Exit(code)) => std::process::exit(code),
            Err(e) => {
                eprintln!("vsh: {e}");
                last = ExitStatus::FAILURE;
            }
        }
    }
    std::process::exit(last.code());
}

fn run_repl(shell: &mut Shell, shell_config: &vsh_config::ShellConfig) {
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    let rl_config = match build_rl_config(shell_config.history.max_entries) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("vsh: readline: {e}");
            return;
        }
    };

    let mut rl = match DefaultEditor::with_config(rl_config) {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("vsh: readline: {e}");
            return;
        }
    };

    let history_path = history_path(&shell_config.history.file);
    let _ = rl.load_history(&history_path);

    println!("vsh v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' to quit.");
    println!();

    let mut last_code = 0;

    loop {
        let prompt = render_prompt(&shell_config.prompt, last_code);

        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if line == "exit" || line == "quit" {
                    break;
                }

                match shell.execute(line) {
                    Ok(status) => last_code = status.code(),
                    Err(VshError::Exit(code)) => {
                        let _ = rl.save_history(&history_path);
                        std::process::exit(code);
                    }
                    Err(e) => {
                        eprintln!("vsh: {e}");
                        last_code = 1;
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("exit");
                break;
            }
            Err(e) => {
                eprintln!("vsh: {e:?}");
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
}

fn build_rl_config(max_history: usize) -> rustyline::Result<rustyline::Config> {
    Ok(rustyline::Config::builder()
        .max_history_size(max_history)?
        .history_ignore_dups(true)?
        .history_ignore_space(true)
        .build())
}

fn history_path(configured: &str) -> std::path::PathBuf {
    if let Some(stripped) = configured.strip_prefix("~/") {
        home_dir().join(stripped)
    } else {
        std::path::PathBuf::from(configured)
    }
}

fn home_dir() -> std::path::PathBuf {
    dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from("."))
}

fn render_prompt(template: &str, last_code: i32) -> String {
    let cwd = std::env::current_dir()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "?".to_string());
    let user = std::env::var("USER").unwrap_or_else(|_| "anonymous".to_string());

    template
        .replace("{cwd}", &cwd)
        .replace("{user}", &user)
        .replace("{status}", &last_code.to_string())
        .replace("{red}", "\x1b[31m")
        .replace("{green}", "\x1b[32m")
        .replace("{blue}", "\x1b[34m")
        .replace("{yellow}", "\x1b[33m")
        .replace("{bold}", "\x1b[1m")
        .replace("{reset}", "\x1b[0m")
}
