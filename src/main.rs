//! Pyrite CLI and REPL
//!
//! Usage:
//!   pyrite run <file.pyr>   - Execute a Pyrite file
//!   pyrite repl             - Start interactive REPL
//!   pyrite help             - Show help message

use std::env;
use std::fs;
use std::io;
use std::process;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use pyrite::closure::Closure;
use pyrite::interpreter::{self, StreamContext};
use pyrite::{Lexer, Parser, VERSION};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return;
    }

    match args[1].as_str() {
        "run" => {
            if args.len() < 3 {
                eprintln!("{}: missing file argument", "error".red());
                eprintln!("Usage: pyrite run <file.pyr>");
                process::exit(1);
            }
            run_file(&args[2]);
        }
        "repl" => run_repl(),
        "help" | "--help" | "-h" => print_help(),
        "version" | "--version" | "-v" => println!("Pyrite {}", VERSION),
        _ => {
            // Assume it's a file
            if args[1].ends_with(".pyr") {
                run_file(&args[1]);
            } else {
                eprintln!("{}: unknown command '{}'", "error".red(), args[1]);
                print_help();
                process::exit(1);
            }
        }
    }
}

fn print_help() {
    println!("{}", "Pyrite".cyan().bold());
    println!("A small indentation-based scripting language");
    println!("{} {}\n", "Version".cyan(), VERSION);
    println!("{}", "USAGE:".yellow());
    println!("  pyrite run <file.pyr>    Execute a Pyrite file");
    println!("  pyrite repl              Start interactive REPL");
    println!("  pyrite help              Show this help message");
    println!("  pyrite version           Show version\n");
    println!("{}", "EXAMPLES:".yellow());
    println!("  pyrite run demos/hello.pyr");
    println!("  pyrite repl\n");
    println!("{}", "LANGUAGE FEATURES:".yellow());
    println!("  x = 10                   Assignment");
    println!("  print x, 'items'         Print with spaces between arguments");
    println!("  if x < 5:                Conditionals over indented blocks");
    println!("  class Dog(Animal):       Classes with single inheritance");
    println!("  def bark(self):          Methods; self is the receiver");
}

fn run_file(path: &str) {
    let source = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("{}: cannot read file '{}': {}", "error".red(), path, e);
            process::exit(1);
        }
    };

    if let Err(e) = pyrite::run(&source, io::stdout()) {
        let err = e.with_source(&source);
        eprintln!("{}", err);
        process::exit(1);
    }
}

fn run_repl() {
    println!(
        "{} {} - {}",
        "Pyrite".cyan().bold(),
        VERSION.cyan(),
        "An indentation-based scripting language".dimmed()
    );
    println!(
        "Type {} to exit, {} for help. End an indented block with an empty line.\n",
        "exit".yellow(),
        "help".yellow()
    );

    let mut rl = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: cannot start REPL: {}", "error".red(), e);
            process::exit(1);
        }
    };

    // State persists across inputs: the root closure for variables, the
    // class table for the parser.
    let mut closure = Closure::new();
    let mut classes = std::collections::HashMap::new();
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "pyr> " } else { "...> " };
        match rl.readline(&format!("{}", prompt.green().bold())) {
            Ok(line) => {
                if buffer.is_empty() {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match trimmed {
                        "exit" | "quit" => {
                            println!("{}", "Goodbye!".cyan());
                            break;
                        }
                        "help" => {
                            print_repl_help();
                            continue;
                        }
                        "clear" => {
                            closure = Closure::new();
                            classes = std::collections::HashMap::new();
                            println!("{}", "State cleared.".dimmed());
                            continue;
                        }
                        _ => {}
                    }
                }

                // A line ending in ':' opens a block; keep buffering until
                // an empty line closes it.
                let continuing = !buffer.is_empty();
                buffer.push_str(&line);
                buffer.push('\n');
                if (continuing || line.trim_end().ends_with(':')) && !line.trim().is_empty() {
                    continue;
                }

                let chunk = std::mem::take(&mut buffer);
                let _ = rl.add_history_entry(chunk.trim_end());

                match eval_chunk(&chunk, &mut closure, &mut classes) {
                    Ok(()) => {}
                    Err(e) => {
                        let err = e.with_source(&chunk);
                        eprintln!("{}", format!("{}", err).red());
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
                println!("{}", "^C".dimmed());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "Goodbye!".cyan());
                break;
            }
            Err(err) => {
                eprintln!("{}: {:?}", "error".red(), err);
                break;
            }
        }
    }
}

fn eval_chunk(
    source: &str,
    closure: &mut Closure,
    classes: &mut std::collections::HashMap<String, std::rc::Rc<pyrite::value::Class>>,
) -> pyrite::Result<()> {
    let lexer = Lexer::new(source)?;
    let mut parser = Parser::with_classes(lexer, classes.clone());
    let program = parser.parse()?;
    *classes = parser.into_classes();

    let mut ctx = StreamContext::new(io::stdout());
    interpreter::run_program(&program, closure, &mut ctx)
}

fn print_repl_help() {
    println!("{}", "REPL Commands:".yellow());
    println!("  exit, quit   Exit the REPL");
    println!("  clear        Clear variables and classes");
    println!("  help         Show this help\n");
    println!("{}", "Language Examples:".yellow());
    println!("  x = 10");
    println!("  print x + 32");
    println!("  class Dog:");
    println!("    def bark(self):");
    println!("      print 'woof'");
    println!("  Dog().bark()");
}
