use std::{
    collections::VecDeque,
    env, fs,
    io::{self, BufRead, Write},
};

use inkvm::{
    Story, StoryError,
    runtime::container::Container,
};
use tracing::{debug, info};

fn main() {
    let mut args: Vec<String> = env::args().collect();
    let verbose = args.iter().any(|arg| arg == "--verbose");
    let trace = args.iter().any(|arg| arg == "--trace");
    if verbose {
        args.retain(|arg| arg != "--verbose");
    }
    if trace {
        args.retain(|arg| arg != "--trace");
    }
    init_tracing(verbose, trace);

    let Some(seed) = extract_seed(&mut args) else {
        return;
    };
    let Some(choices) = extract_choices(&mut args) else {
        return;
    };
    let Some(save_path) = extract_value(&mut args, "--save") else {
        return;
    };
    let Some(load_path) = extract_value(&mut args, "--load") else {
        return;
    };

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_help();
        return;
    }

    match args[1].as_str() {
        "play" => {
            if args.len() < 3 {
                eprintln!("Usage: inkvm play <story.json>");
                return;
            }
            let options = PlayOptions {
                seed,
                choices,
                save_path,
                load_path,
            };
            play_file(&args[2], options);
        }
        "inspect" => {
            if args.len() < 3 {
                eprintln!("Usage: inkvm inspect <story.json>");
                return;
            }
            inspect_file(&args[2]);
        }
        "roundtrip" => {
            if args.len() < 3 {
                eprintln!("Usage: inkvm roundtrip <story.json>");
                return;
            }
            roundtrip_file(&args[2]);
        }
        path => {
            let options = PlayOptions {
                seed,
                choices,
                save_path,
                load_path,
            };
            play_file(path, options);
        }
    }
}

fn print_help() {
    println!(
        "\
inkvm CLI

Usage:
  inkvm <story.json>
  inkvm play <story.json>
  inkvm inspect <story.json>
  inkvm roundtrip <story.json>

Flags:
  --verbose            Log loading, choices and state changes
  --trace              Log every executed content item
  --seed <n>           Seed the story's random number generator
  --choices <a,b,..>   Take these choices (1-based) instead of reading stdin
  --save <file>        Write the story state to <file> when play stops
  --load <file>        Resume from a state written with --save

Environment:
  RUST_LOG             Overrides the log filter (e.g. RUST_LOG=inkvm=debug)
"
    );
}

fn init_tracing(verbose: bool, trace: bool) {
    let default_filter = if trace {
        "inkvm=trace"
    } else if verbose {
        "inkvm=debug"
    } else {
        "inkvm=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn extract_value(args: &mut Vec<String>, flag: &str) -> Option<Option<String>> {
    let mut value = None;
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            if i + 1 >= args.len() {
                eprintln!("Usage: inkvm <story.json> {flag} <file>");
                return None;
            }
            value = Some(args.remove(i + 1));
            args.remove(i);
            continue;
        }
        i += 1;
    }
    Some(value)
}

fn extract_seed(args: &mut Vec<String>) -> Option<Option<i32>> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--seed" {
            if i + 1 >= args.len() {
                eprintln!("Usage: inkvm <story.json> --seed <n>");
                return None;
            }
            let value = args.remove(i + 1);
            args.remove(i);
            return match value.parse::<i32>() {
                Ok(seed) => Some(Some(seed)),
                Err(_) => {
                    eprintln!("Error: --seed expects an integer.");
                    None
                }
            };
        }
        i += 1;
    }
    Some(None)
}

fn extract_choices(args: &mut Vec<String>) -> Option<Option<VecDeque<usize>>> {
    let Some(value) = extract_value(args, "--choices")? else {
        return Some(None);
    };
    let mut choices = VecDeque::new();
    for part in value.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        match part.parse::<usize>() {
            Ok(number) if number > 0 => choices.push_back(number),
            _ => {
                eprintln!("Error: --choices expects comma-separated numbers starting at 1.");
                return None;
            }
        }
    }
    Some(Some(choices))
}

struct PlayOptions {
    seed: Option<i32>,
    choices: Option<VecDeque<usize>>,
    save_path: Option<String>,
    load_path: Option<String>,
}

fn load_story(path: &str) -> Story {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {}: {}", path, e);
            std::process::exit(1);
        }
    };
    // Compilers emit a byte order mark in front of the document.
    match Story::from_json(source.trim_start_matches('\u{feff}')) {
        Ok(story) => story,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

fn play_file(path: &str, mut options: PlayOptions) {
    let mut story = load_story(path);
    if let Some(seed) = options.seed {
        story.set_seed(seed);
    }
    if let Some(load_path) = &options.load_path {
        let loaded = fs::read_to_string(load_path)
            .map_err(|e| e.to_string())
            .and_then(|json| story.load_state(&json).map_err(|e| e.to_string()));
        if let Err(e) = loaded {
            eprintln!("Error loading state from {}: {}", load_path, e);
            std::process::exit(1);
        }
        info!(path = %load_path, "resumed from saved state");
    }

    let result = play(&mut story, &mut options.choices);
    for warning in story.current_warnings() {
        eprintln!("{}", warning);
    }

    if let Some(save_path) = &options.save_path {
        let saved = story
            .save_state()
            .map_err(|e| e.to_string())
            .and_then(|json| fs::write(save_path, json).map_err(|e| e.to_string()));
        match saved {
            Ok(()) => info!(path = %save_path, "state saved"),
            Err(e) => eprintln!("Error saving state to {}: {}", save_path, e),
        }
    }

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn play(story: &mut Story, scripted: &mut Option<VecDeque<usize>>) -> Result<(), StoryError> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    loop {
        while story.can_continue() {
            let line = story.advance()?;
            print!("{}", line);
            let tags = story.current_tags();
            if !tags.is_empty() {
                println!("# {}", tags.join(", "));
            }
        }

        let choices: Vec<String> = story
            .current_choices()
            .iter()
            .map(|choice| choice.text.clone())
            .collect();
        if choices.is_empty() {
            return Ok(());
        }
        println!();
        for (i, text) in choices.iter().enumerate() {
            println!("{}: {}", i + 1, text);
        }

        let number = match scripted {
            Some(queue) => match queue.pop_front() {
                Some(number) => {
                    println!("?> {}", number);
                    number
                }
                // Scripted runs stop at the first unanswered choice.
                None => return Ok(()),
            },
            None => match read_choice(&mut input, choices.len()) {
                Some(number) => number,
                None => return Ok(()),
            },
        };
        debug!(number, "choice taken");
        story.choose(number - 1)?;
    }
}

/// Prompts until a valid 1-based choice number is read. `None` on end of
/// input.
fn read_choice(input: &mut impl BufRead, count: usize) -> Option<usize> {
    loop {
        print!("?> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return None,
            Ok(_) => {}
        }
        match line.trim().parse::<usize>() {
            Ok(number) if (1..=count).contains(&number) => return Some(number),
            _ => println!("Enter a number between 1 and {}.", count),
        }
    }
}

fn inspect_file(path: &str) {
    let story = load_story(path);
    print_container(story.root(), "<root>", 0);

    let lists = story.list_definitions().lists();
    if !lists.is_empty() {
        println!();
        println!("Lists:");
        for list in lists {
            let items: Vec<String> = list
                .raw_items()
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            println!("  {}: {}", list.name(), items.join(", "));
        }
    }

    let mut globals: Vec<(String, String)> = story
        .state()
        .variables()
        .globals()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    if !globals.is_empty() {
        globals.sort();
        println!();
        println!("Globals:");
        for (name, value) in globals {
            println!("  {} = {}", name, value);
        }
    }
}

fn print_container(container: &Container, label: &str, depth: usize) {
    let flags = container.count_flags().bits();
    let flags = if flags > 0 {
        format!(" #f={flags}")
    } else {
        String::new()
    };
    println!(
        "{:indent$}{} ({} items){}",
        "",
        label,
        container.content().len(),
        flags,
        indent = depth * 2
    );
    for (index, child) in container
        .content()
        .iter()
        .enumerate()
        .filter_map(|(index, content)| content.as_container().map(|child| (index, child)))
    {
        let label = match child.name() {
            Some(name) => format!("{index}: {name}"),
            None => index.to_string(),
        };
        print_container(child, &label, depth + 1);
    }
    for child in container.named_only() {
        print_container(child, child.name().unwrap_or("?"), depth + 1);
    }
}

fn roundtrip_file(path: &str) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {}: {}", path, e);
            std::process::exit(1);
        }
    };
    let source = source.trim_start_matches('\u{feff}');
    let story = load_story(path);
    let written = match story.to_json() {
        Ok(written) => written,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let original: Result<serde_json::Value, _> = serde_json::from_str(source);
    let rewritten: Result<serde_json::Value, _> = serde_json::from_str(&written);
    match (original, rewritten) {
        (Ok(original), Ok(rewritten)) if original == rewritten => {
            println!("{}: unchanged", path);
        }
        (Ok(_), Ok(_)) => {
            println!("{}: changed", path);
            println!("{}", written);
            std::process::exit(1);
        }
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Error comparing {}: {}", path, e);
            std::process::exit(1);
        }
    }
}
