#![cfg(test)]

//! This module runs test cases defined in `test/cases`.
//!
//! Each test case consists of three files, named in terms of `<name>`, the name of the test case:
//! * `<name>.args`: the command line arguments, one per line, excluding connection options
//! * `<name>.xml`: the response the stub media server gives to every request
//! * `<name>.json`: the expected output of the command
//!
//! A case which expects the command to fail has `<name>.err` instead of `<name>.json`, containing
//! text which the error message must include. A case may also have `<name>.query`, listing the
//! query parameters of the last request sent to the server, one `key=value` per line.
//!
//! The runner starts a stub MCWS server for each case, points the command at it, and makes sure
//! the printed JSON matches the expected output.
//!
//! Run these tests with `cargo test -p mcws-cli`.

use super::Options;
use ansi_term::Color;
use anyhow::Error;
use clap::Parser;
use futures::future::join_all;
use mcws::{
    init_logging,
    testing::{Stub, StubServer},
};
use serde_json::Value;
use std::ffi::OsString;
use std::fmt::{self, Display, Formatter};
use std::fs::{self, File};
use std::path::Path;

#[async_std::test]
async fn cli_test_cases() -> Result<(), Error> {
    init_logging();

    // Discover test cases.
    let test_cases = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("test/cases")
        .read_dir()?
        .filter_map(|dirent| {
            let path = dirent.unwrap().path();
            if path.extension()?.to_str().unwrap() == "args" {
                Some(TestCase::new(&path).unwrap())
            } else {
                None
            }
        })
        .collect::<Vec<_>>();
    assert!(!test_cases.is_empty(), "no test cases found");

    let results = join_all(test_cases.into_iter().map(TestCase::run)).await;
    for result in &results {
        println!("{}", result);
    }
    if results.iter().any(TestResult::failed) {
        Err(Error::msg(format!("{}", Color::Red.paint("tests failed"))))
    } else {
        println!("All test cases passed.");
        Ok(())
    }
}

#[derive(Clone, Debug)]
enum Expected {
    Output(Value),
    Error(String),
}

#[derive(Clone, Debug)]
struct TestCase {
    name: OsString,
    args: Vec<String>,
    response: String,
    expected: Expected,
    query: Option<Vec<(String, String)>>,
}

impl TestCase {
    fn new(args_path: impl AsRef<Path>) -> Result<Self, Error> {
        let args_path = args_path.as_ref();
        let name = args_path.file_stem().unwrap();
        let args = fs::read_to_string(args_path)?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        let response = fs::read_to_string(args_path.with_extension("xml"))?;
        let err_path = args_path.with_extension("err");
        let expected = if err_path.exists() {
            Expected::Error(fs::read_to_string(err_path)?.trim().to_string())
        } else {
            Expected::Output(serde_json::from_reader(File::open(
                args_path.with_extension("json"),
            )?)?)
        };
        let query_path = args_path.with_extension("query");
        let query = if query_path.exists() {
            Some(
                fs::read_to_string(query_path)?
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(|line| match line.split_once('=') {
                        Some((key, value)) => Ok((key.to_string(), value.to_string())),
                        None => Err(Error::msg(format!("malformed query line {line}"))),
                    })
                    .collect::<Result<Vec<_>, Error>>()?,
            )
        } else {
            None
        };
        Ok(Self {
            name: name.into(),
            args,
            response,
            expected,
            query,
        })
    }

    async fn run(self) -> TestResult {
        TestResult {
            name: self.name.clone(),
            failure: self.do_test().await.err(),
        }
    }

    async fn do_test(self) -> Result<(), Error> {
        let server = StubServer::start([("*", Stub::xml(self.response))]).await?;
        let port = server.port().to_string();
        let opt = Options::try_parse_from(
            ["mcws", "--host", "127.0.0.1", "--port", &port]
                .into_iter()
                .map(String::from)
                .chain(self.args),
        )?;

        match (opt.run().await, self.expected) {
            (Ok(output), Expected::Output(expected)) if output != expected => {
                return Err(Error::msg(format!(
                    "expected output:\n{expected}\nactual output:\n{output}"
                )));
            }
            (Ok(_), Expected::Output(_)) => {}
            (Ok(output), Expected::Error(expected)) => {
                return Err(Error::msg(format!(
                    "expected error containing \"{expected}\"\nactual output:\n{output}"
                )));
            }
            (Err(err), Expected::Error(expected)) if !format!("{err:#}").contains(&expected) => {
                return Err(Error::msg(format!(
                    "expected error containing \"{expected}\"\nactual error:\n{err:#}"
                )));
            }
            (Err(_), Expected::Error(_)) => {}
            (Err(err), Expected::Output(_)) => return Err(err),
        }

        if let Some(expected) = self.query {
            let query = server.last_query().await;
            if query != expected {
                return Err(Error::msg(format!(
                    "expected last request query:\n{expected:?}\nactual query:\n{query:?}"
                )));
            }
        }
        Ok(())
    }
}

struct TestResult {
    name: OsString,
    failure: Option<anyhow::Error>,
}

impl TestResult {
    fn failed(&self) -> bool {
        self.failure.is_some()
    }
}

impl Display for TestResult {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}...", self.name.to_string_lossy())?;
        if let Some(err) = &self.failure {
            writeln!(f, "{}", Color::Red.paint("FAILED"))?;
            write!(f, "{err:#}")?;
        } else {
            write!(f, "{}", Color::Green.paint("OK"))?;
        }
        Ok(())
    }
}
