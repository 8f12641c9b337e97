use clap::Parser;

/// Recounts a published ballot result file and checks it against the published result.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The result file of a tallied ballot, in JSON format.
    #[clap(short, long, value_parser)]
    pub input: String,

    /// (string, optional) Your attendee secret. If given, the vote cast with this secret is
    /// looked up in the result file and printed.
    #[clap(short, long, value_parser)]
    pub secret: Option<String>,

    /// (file path) A reference file containing the summary of the ballot in JSON format. If provided,
    /// cdetally will check that the recounted summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the recounted summary of the ballot will be written
    /// in JSON format to the given location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
