//! Topic grouping through a language model.
//!
//! We own the prompt and the reply parsing; the transport (HTTP client, local runtime, a canned
//! reply in tests) is injected as a closure so this crate never talks to the network itself.

use std::fmt::Write as _;

use crate::Result;
use crate::error::Error;
use crate::phrase::Phrase;
use crate::topic::{GroupSpan, TopicCollaborator};

/// A [`TopicCollaborator`] backed by a text-completion transport.
///
/// `complete` receives the full prompt and returns the model's raw reply.
pub struct LlmCollaborator<F>
where
    F: Fn(&str) -> anyhow::Result<String>,
{
    complete: F,
}

impl<F> LlmCollaborator<F>
where
    F: Fn(&str) -> anyhow::Result<String>,
{
    pub fn new(complete: F) -> Self {
        Self { complete }
    }
}

impl<F> TopicCollaborator for LlmCollaborator<F>
where
    F: Fn(&str) -> anyhow::Result<String>,
{
    fn partition(&self, phrases: &[Phrase], facts: &[String]) -> Result<Vec<GroupSpan>> {
        let prompt = build_prompt(phrases, facts);
        let reply = (self.complete)(&prompt)?;
        parse_partition_reply(&reply)
    }
}

/// Build the grouping prompt for `phrases`.
///
/// Phrases are listed with zero-based indices, the same indices the reply must use.
pub fn build_prompt(phrases: &[Phrase], facts: &[String]) -> String {
    let mut prompt = String::from("Group these lyric phrases by the concept they discuss.\n\nPhrases:\n");
    for (i, phrase) in phrases.iter().enumerate() {
        let _ = writeln!(prompt, "{i}. {}", phrase.text);
    }

    prompt.push_str("\nKey facts:\n");
    for fact in facts {
        let _ = writeln!(prompt, "- {fact}");
    }

    prompt.push_str(
        "\nRules:\n\
         - Keep groups as large as possible while maintaining topic coherence\n\
         - Only consecutive phrases may share a group; every phrase belongs to exactly one group\n\
         - Each group should have a clear topic\n\
         - List the key terms (lowercase) that appear in each group\n\
         \n\
         Return a JSON array of groups:\n\
         [\n  {\"phrase_indices\": [0, 1], \"topic\": \"chlorophyll and light absorption\", \
         \"key_terms\": [\"chlorophyll\", \"leaf\"]}\n]\n",
    );

    prompt
}

/// Extract a partition from a model reply.
///
/// Models wrap JSON in prose or code fences, so we take everything between the first `[` and the
/// last `]` and parse that.
pub fn parse_partition_reply(reply: &str) -> Result<Vec<GroupSpan>> {
    let (Some(start), Some(end)) = (reply.find('['), reply.rfind(']')) else {
        return Err(Error::invalid_grouping("reply contains no JSON array"));
    };
    if end < start {
        return Err(Error::invalid_grouping("reply contains no JSON array"));
    }

    serde_json::from_str(&reply[start..=end])
        .map_err(|err| Error::invalid_grouping(format!("reply is not a group array: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::{GroupingStrategy, group_phrases};

    fn phrase(text: &str, start: f64, end: f64) -> Phrase {
        Phrase {
            text: text.to_string(),
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn prompt_lists_phrases_and_facts() {
        let prompt = build_prompt(
            &[phrase("Look at a leaf", 0.5, 1.3), phrase("It's green", 1.8, 2.3)],
            &["Chlorophyll absorbs red and blue light".to_string()],
        );
        assert!(prompt.contains("0. Look at a leaf\n1. It's green\n"));
        assert!(prompt.contains("- Chlorophyll absorbs red and blue light\n"));
        assert!(prompt.contains("phrase_indices"));
    }

    #[test]
    fn parses_reply_wrapped_in_prose() -> anyhow::Result<()> {
        let reply = "Sure! Here are the groups:\n```json\n[{\"phrase_indices\": [0, 1], \
                     \"topic\": \"leaves\", \"key_terms\": [\"leaf\"]}]\n```\nHope that helps.";
        let spans = parse_partition_reply(reply)?;
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].topic, "leaves");
        Ok(())
    }

    #[test]
    fn reply_without_array_is_invalid() {
        let err = parse_partition_reply("I cannot help with that.").unwrap_err();
        assert!(matches!(err, Error::TopicGroupingInvalid(_)));
        assert!(parse_partition_reply("] oops [").is_err());
        assert!(parse_partition_reply("[{\"topic\": 3}]").is_err());
    }

    #[test]
    fn transport_failure_falls_back_locally() {
        let collaborator = LlmCollaborator::new(|_| Err(anyhow::anyhow!("timed out")));
        let phrases = [phrase("a", 0.0, 1.0), phrase("b", 2.0, 3.0)];
        let grouping = group_phrases(&phrases, &[], Some(&collaborator));
        assert_eq!(grouping.strategy, GroupingStrategy::LocalFallback);
    }

    #[test]
    fn canned_reply_drives_grouping() {
        let collaborator = LlmCollaborator::new(|prompt| {
            assert!(prompt.contains("1. b"));
            Ok(r#"[{"phrase_indices":[0,1],"topic":"ab","key_terms":["A"]}]"#.to_string())
        });
        let phrases = [phrase("a", 0.0, 1.0), phrase("b", 2.0, 3.0)];
        let grouping = group_phrases(&phrases, &[], Some(&collaborator));
        assert_eq!(grouping.strategy, GroupingStrategy::Collaborator);
        assert_eq!(grouping.groups.len(), 1);
        assert!(grouping.groups[0].key_terms.contains("a"));
    }
}
