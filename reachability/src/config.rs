//! Configuration for the reachability driver.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Parameters of a reachability computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of partitions, each owned by one worker.
    pub workers: usize,
    /// Upper bound on the number of rounds of the fixpoint loop.
    ///
    /// Least-label propagation always converges, so the bound only guards against
    /// misbehaving inputs; the default is effectively "until fixpoint".
    pub max_iterations: u32,
    /// Report a computation that hits `max_iterations` as an error, rather than returning
    /// the labels reached so far.
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workers: 1,
            max_iterations: u32::MAX,
            strict: false,
        }
    }
}

impl Config {
    /// A configuration with `workers` partitions and otherwise default settings.
    pub fn process(workers: usize) -> Self {
        Config { workers, ..Default::default() }
    }

    /// Sets the iteration bound.
    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets whether non-convergence is reported as an error.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Checks that the configuration can run a computation.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("at least one worker is required".to_owned()));
        }
        if self.max_iterations == 0 {
            return Err(Error::Config("the iteration bound must be positive".to_owned()));
        }
        Ok(())
    }

    /// Constructs a new configuration by parsing supplied text arguments.
    ///
    /// Most commonly, this uses `std::env::args()` with the program name skipped. Recognized
    /// arguments are `-w/--workers NUM`, `-i/--iterations NUM`, and `--strict`; anything else
    /// is left in place and returned alongside the configuration.
    pub fn from_args<I: Iterator<Item=String>>(args: I) -> Result<(Config, Vec<String>)> {

        let mut opts = getopts::Options::new();
        opts.optopt("w", "workers", "number of partition workers", "NUM");
        opts.optopt("i", "iterations", "maximum number of fixpoint rounds", "NUM");
        opts.optflag("", "strict", "fail if the fixpoint is not reached");

        let matches = opts.parse(args)?;

        let mut config = Config::default();
        if let Some(workers) = matches.opt_str("w") {
            config.workers = workers.parse().map_err(|_| Error::Config(format!("invalid worker count: {:?}", workers)))?;
        }
        if let Some(iterations) = matches.opt_str("i") {
            config.max_iterations = iterations.parse().map_err(|_| Error::Config(format!("invalid iteration bound: {:?}", iterations)))?;
        }
        config.strict = matches.opt_present("strict");
        config.validate()?;

        Ok((config, matches.free))
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::Error;

    fn args(text: &str) -> impl Iterator<Item=String> + '_ {
        text.split_whitespace().map(|x| x.to_owned())
    }

    #[test]
    fn parse_arguments() {
        let (config, free) = Config::from_args(args("100 -w 4 --iterations 20 --strict 200")).unwrap();
        assert_eq!(config, Config::process(4).max_iterations(20).strict(true));
        assert_eq!(free, vec!["100".to_owned(), "200".to_owned()]);
    }

    #[test]
    fn defaults_without_arguments() {
        let (config, free) = Config::from_args(args("")).unwrap();
        assert_eq!(config, Config::default());
        assert!(free.is_empty());
    }

    #[test]
    fn reject_bad_arguments() {
        assert!(matches!(Config::from_args(args("-w zero")), Err(Error::Config(_))));
        assert!(matches!(Config::from_args(args("-w 0")), Err(Error::Config(_))));
        assert!(matches!(Config::from_args(args("-i 0")), Err(Error::Config(_))));
        assert!(matches!(Config::from_args(args("--unknown")), Err(Error::Config(_))));
    }
}
