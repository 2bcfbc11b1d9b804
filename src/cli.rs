use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory holding config.yaml and cached models.
    /// Defaults to $MEDVAULT_BASE_PATH or ~/.local/share/medvault
    #[clap(long, global = true)]
    pub base_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CorpusArgs {
    /// YAML or JSON file with documents to index (repeatable)
    #[clap(long = "docs")]
    pub docs: Vec<PathBuf>,

    /// Don't index the built-in demo notes
    #[clap(long, default_value = "false")]
    pub no_seed: bool,

    /// Number of hits to return (defaults to search.default_top_k)
    #[clap(short = 'k', long)]
    pub top_k: Option<usize>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the embedding of a text as JSON
    Embed {
        /// Text to embed
        text: String,
    },

    /// Split a file into chunks and print them as JSON
    Chunk {
        /// File to chunk
        file: PathBuf,

        /// Maximum chunk length in characters (defaults to chunking.max_len)
        #[clap(long)]
        max_len: Option<usize>,
    },

    /// Index the corpus and print the ranked hits for a query
    Search {
        /// Query text
        query: String,

        /// Metadata filter as key=value (repeatable).
        /// Values are parsed as JSON when possible, e.g. chunk=0
        #[clap(short, long = "filter")]
        filters: Vec<String>,

        #[command(flatten)]
        corpus: CorpusArgs,
    },

    /// Index the corpus and print a grounded prompt for a question
    Ask {
        /// Question text
        question: String,

        #[command(flatten)]
        corpus: CorpusArgs,
    },

    /// Index the corpus and print every stored chunk without its vector
    List {
        #[command(flatten)]
        corpus: CorpusArgs,
    },
}
