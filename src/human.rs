//! Human input channel: strategy choice and blueprint approval.

use crate::blueprint::StructuredBlueprint;
use crate::revision::ApprovalDecision;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// Where the orchestrator suspends for human decisions.
///
/// An error means no decision will ever arrive (input closed).
#[async_trait]
pub trait HumanInput: Send {
    /// Presents the strategy options and returns the chosen strategy.
    async fn await_choice(&mut self, options: &str) -> Result<String>;

    async fn await_approval(&mut self, blueprint: &StructuredBlueprint)
        -> Result<ApprovalDecision>;
}

/// Parses one approval line: `approve` (or `a`, `y`, `yes`), or
/// `revise <feedback>` (or `r <feedback>`). Returns `None` for anything else.
pub fn parse_decision(line: &str) -> Option<ApprovalDecision> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    match command.to_ascii_lowercase().as_str() {
        "approve" | "a" | "y" | "yes" if rest.is_empty() => Some(ApprovalDecision::Approve),
        "revise" | "r" if !rest.is_empty() => Some(ApprovalDecision::Revise {
            feedback: rest.to_string(),
        }),
        _ => None,
    }
}

/// Line-oriented terminal prompt.
pub struct TerminalInput<R, W> {
    reader: R,
    writer: W,
}

impl TerminalInput<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> TerminalInput<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    async fn say(&mut self, text: &str) -> Result<()> {
        self.writer
            .write_all(text.as_bytes())
            .await
            .context("Failed to write to terminal")?;
        self.writer.flush().await.context("Failed to flush terminal")?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .await
            .context("Failed to read from terminal")?;
        if read == 0 {
            anyhow::bail!("input closed before a decision was made");
        }
        Ok(line.trim().to_string())
    }
}

#[async_trait]
impl<R, W> HumanInput for TerminalInput<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn await_choice(&mut self, options: &str) -> Result<String> {
        self.say(&format!("\n{}\n\nChoose a strategy: ", options.trim()))
            .await?;
        loop {
            let line = self.read_line().await?;
            if !line.is_empty() {
                return Ok(line);
            }
            self.say("Please enter a strategy (a number or a description): ")
                .await?;
        }
    }

    async fn await_approval(
        &mut self,
        blueprint: &StructuredBlueprint,
    ) -> Result<ApprovalDecision> {
        self.say(&format!(
            "\n{}\n\nType `approve`, or `revise <feedback>`: ",
            blueprint.to_json_pretty()
        ))
        .await?;
        loop {
            let line = self.read_line().await?;
            if let Some(decision) = parse_decision(&line) {
                return Ok(decision);
            }
            self.say("Unrecognized input. Type `approve`, or `revise <feedback>`: ")
                .await?;
        }
    }
}

/// A reply delivered through [`ChannelInput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HumanReply {
    Choice(String),
    Decision(ApprovalDecision),
}

/// Human input fed from another task over a channel.
pub struct ChannelInput {
    rx: mpsc::UnboundedReceiver<HumanReply>,
}

impl ChannelInput {
    pub fn new() -> (Self, mpsc::UnboundedSender<HumanReply>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, tx)
    }

    async fn next(&mut self) -> Result<HumanReply> {
        self.rx
            .recv()
            .await
            .context("human input channel closed before a decision was made")
    }
}

#[async_trait]
impl HumanInput for ChannelInput {
    async fn await_choice(&mut self, _options: &str) -> Result<String> {
        match self.next().await? {
            HumanReply::Choice(choice) => Ok(choice),
            other => anyhow::bail!("expected a strategy choice, got {:?}", other),
        }
    }

    async fn await_approval(
        &mut self,
        _blueprint: &StructuredBlueprint,
    ) -> Result<ApprovalDecision> {
        match self.next().await? {
            HumanReply::Decision(decision) => Ok(decision),
            other => anyhow::bail!("expected an approval decision, got {:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::{AgentSpec, FlowType};
    use std::collections::BTreeSet;

    fn blueprint() -> StructuredBlueprint {
        StructuredBlueprint {
            system_name: "Shop".to_string(),
            description: None,
            flow_type: FlowType::Sequential,
            agents: vec![AgentSpec {
                name: "SearchAgent".to_string(),
                role: "Find products".to_string(),
                tools: BTreeSet::new(),
                dependencies: BTreeSet::new(),
            }],
        }
    }

    fn revise(feedback: &str) -> ApprovalDecision {
        ApprovalDecision::Revise {
            feedback: feedback.to_string(),
        }
    }

    #[test]
    fn test_parse_decision() {
        assert_eq!(parse_decision("approve"), Some(ApprovalDecision::Approve));
        assert_eq!(parse_decision("  Y "), Some(ApprovalDecision::Approve));
        assert_eq!(
            parse_decision("revise add a payment agent"),
            Some(revise("add a payment agent"))
        );
        assert_eq!(parse_decision("r  fewer agents "), Some(revise("fewer agents")));
        assert_eq!(parse_decision("revise"), None);
        assert_eq!(parse_decision("approve it now"), None);
        assert_eq!(parse_decision("maybe"), None);
        assert_eq!(parse_decision(""), None);
    }

    #[tokio::test]
    async fn test_terminal_choice_skips_blank_lines() {
        let input: &[u8] = b"\n  \n2\n";
        let mut output = Vec::new();
        let mut terminal = TerminalInput::new(input, &mut output);

        let choice = terminal.await_choice("1. One\n2. Two").await.unwrap();
        assert_eq!(choice, "2");
        drop(terminal);

        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("2. Two"));
        assert!(shown.contains("Please enter a strategy"));
    }

    #[tokio::test]
    async fn test_terminal_approval_reprompts_until_valid() {
        let input: &[u8] = b"what\nrevise more tools\n";
        let mut output = Vec::new();
        let mut terminal = TerminalInput::new(input, &mut output);

        let decision = terminal.await_approval(&blueprint()).await.unwrap();
        assert_eq!(decision, revise("more tools"));
        drop(terminal);

        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("\"system_name\": \"Shop\""));
        assert!(shown.contains("Unrecognized input"));
    }

    #[tokio::test]
    async fn test_terminal_eof_is_an_error() {
        let input: &[u8] = b"";
        let mut terminal = TerminalInput::new(input, tokio::io::sink());
        assert!(terminal.await_approval(&blueprint()).await.is_err());
    }

    #[tokio::test]
    async fn test_channel_input() {
        let (mut input, tx) = ChannelInput::new();
        tx.send(HumanReply::Choice("team".to_string())).unwrap();
        tx.send(HumanReply::Decision(ApprovalDecision::Approve)).unwrap();
        tx.send(HumanReply::Choice("out of order".to_string())).unwrap();

        assert_eq!(input.await_choice("options").await.unwrap(), "team");
        assert_eq!(
            input.await_approval(&blueprint()).await.unwrap(),
            ApprovalDecision::Approve
        );
        assert!(input.await_approval(&blueprint()).await.is_err());

        drop(tx);
        assert!(input.await_choice("options").await.is_err());
    }
}
