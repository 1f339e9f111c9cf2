use crate::{
    error::{Error, Result},
    types::{Edge, VId},
};
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "graph/grammar.pest"]
struct EdgeListParser;

/// Parses one line of an edge list.
///
/// Returns `None` for a blank line. Anything else must be exactly two
/// non-negative integers separated by whitespace.
pub fn parse_edge(line: &str) -> Result<Option<Edge>> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    let parse_error = |message: String| Error::Parse {
        line: String::from(line),
        message,
    };
    let edge = EdgeListParser::parse(Rule::edge, line)
        .map_err(|e| parse_error(e.to_string()))?
        .next()
        .ok_or_else(|| parse_error(String::from("empty match")))?;
    let mut vertices = edge.into_inner().map(|pair| {
        pair.as_str()
            .parse::<VId>()
            .map_err(|e| parse_error(format!("vertex {}: {}", pair.as_str(), e)))
    });
    match (vertices.next(), vertices.next()) {
        (Some(u), Some(v)) => Ok(Some((u?, v?))),
        _ => Err(parse_error(String::from("expected two vertices"))),
    }
}

/// Splits the raw edge list into lines. Blank lines are kept as no-op items.
pub fn edge_lines(input: &[u8]) -> Result<Vec<String>> {
    let text = std::str::from_utf8(input).map_err(|e| Error::Parse {
        line: String::from("<input>"),
        message: e.to_string(),
    })?;
    Ok(text.lines().map(String::from).collect())
}
