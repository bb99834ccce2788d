use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use dialoguer::Confirm;
use epubspell::cli::output::{self, OutputFormat};
use epubspell::config::WordSort;
use epubspell::{parse_lang_code, Book, Config, Locale, SpellChecker};
use log::debug;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "epubspell")]
#[command(version, about = "List and replace the words of an unpacked e-book", long_about = None)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// More logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Generate shell completion script
    #[arg(long, value_name = "SHELL")]
    completion: Option<Shell>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every spell-checkable word in the book
    Words {
        /// Unpacked book directory
        book: PathBuf,

        /// Language used when the book declares none (e.g. en, fr-CA)
        #[arg(short, long)]
        language: Option<String>,

        /// Output format (text, json)
        #[arg(short = 'o', long, default_value = "text")]
        format: OutputFormat,

        /// Show where each word occurs
        #[arg(long)]
        locations: bool,

        /// Sort order (alpha, count)
        #[arg(long)]
        sort: Option<WordSort>,
    },
    /// Replace a word everywhere it occurs
    Replace {
        /// Unpacked book directory
        book: PathBuf,

        /// Word to replace; repeat to merge several words into one
        #[arg(long = "word", required = true)]
        words: Vec<String>,

        /// Replacement text
        #[arg(long = "with")]
        replacement: String,

        /// Language of the word(s) to replace; defaults to the book language
        #[arg(long)]
        word_lang: Option<String>,

        /// Language used when the book declares none
        #[arg(short, long)]
        language: Option<String>,

        /// Report what would change without writing files
        #[arg(long)]
        dry_run: bool,

        /// Ask before writing
        #[arg(short, long)]
        interactive: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(shell) = cli.completion {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "epubspell", &mut io::stdout());
        return Ok(());
    }

    let use_color = !cli.no_color;
    if !use_color {
        colored::control::set_override(false);
    }

    match cli.command {
        Some(Commands::Words {
            book,
            language,
            format,
            locations,
            sort,
        }) => {
            let config = Config::load(language, sort, locations)?;
            list_words(&book, &config, use_color, &format)
        }
        Some(Commands::Replace {
            book,
            words,
            replacement,
            word_lang,
            language,
            dry_run,
            interactive,
        }) => {
            let config = Config::load(language, None, false)?;
            replace(
                &book,
                &config,
                &words,
                &replacement,
                word_lang.as_deref(),
                dry_run,
                interactive,
                use_color,
            )
        }
        None => anyhow::bail!("No command given. Use --help for usage information."),
    }
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
        }
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn open_book(path: &Path, config: &Config) -> Result<(Book, Locale)> {
    if !path.is_dir() {
        anyhow::bail!("Not an unpacked book directory: {}", path.display());
    }
    let book = Book::open(path).with_context(|| format!("Failed to open book: {}", path.display()))?;
    let fallback = parse_lang_code(&config.language)
        .with_context(|| format!("Invalid configured language: {}", config.language))?;
    let locale = book.book_locale(&fallback);
    debug!("book language: {}", locale);
    Ok((book, locale))
}

fn list_words(path: &Path, config: &Config, colored: bool, format: &OutputFormat) -> Result<()> {
    let (book, locale) = open_book(path, config)?;
    let checker = SpellChecker::new()?;
    let index = checker.get_all_words(&book, &locale);
    output::print_words(path, &index, config, colored, format)
}

#[allow(clippy::too_many_arguments)]
fn replace(
    path: &Path,
    config: &Config,
    words: &[String],
    replacement: &str,
    word_lang: Option<&str>,
    dry_run: bool,
    interactive: bool,
    colored: bool,
) -> Result<()> {
    let (mut book, book_locale) = open_book(path, config)?;
    let locale = match word_lang {
        Some(raw) => parse_lang_code(raw).with_context(|| format!("Invalid language: {}", raw))?,
        None => book_locale.clone(),
    };

    let checker = SpellChecker::new()?;
    let index = checker.get_all_words(&book, &book_locale);
    let keys: Vec<_> = words.iter().map(|word| checker.word_key(word, &locale)).collect();
    let locations = index.merged(&keys);

    if locations.is_empty() {
        output::print_not_found(words, colored);
        return Ok(());
    }

    if interactive {
        let prompt = format!(
            "Replace {} occurrence(s) of {} with {:?}?",
            locations.len(),
            words.join(", "),
            replacement
        );
        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            return Ok(());
        }
    }

    let outcomes = checker.replace_each(&mut book, replacement, &locations, &locale);
    let mut changed = BTreeSet::new();
    let mut replaced = Vec::new();
    for (mut loc, rewritten) in locations.into_iter().zip(outcomes) {
        if rewritten {
            changed.insert(loc.file_name.clone());
            loc.replace(replacement);
            replaced.push(loc);
        }
    }

    if !dry_run {
        book.save()
            .with_context(|| format!("Failed to save book: {}", path.display()))?;
    }

    output::print_replace_summary(&changed, &replaced, dry_run, colored);
    Ok(())
}
