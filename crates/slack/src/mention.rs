//! Rewrites Slack's inline markup into plain display text.
//!
//! Message text references entities with bracketed tokens:
//!
//! - `<@U123>` / `<@U123|label>`: user
//! - `<#C123>` / `<#C123|label>`: conversation
//! - `<!here>`, `<!channel>`, `<!subteam^S1|@team>`, `<!date^...|fallback>`: special
//! - `<https://example.com|label>`, `<mailto:a@b.c>`: links
//!
//! Literal `&`, `<` and `>` arrive entity-encoded. Tokens are located first and
//! every literal piece is decoded exactly once afterwards, so an encoded `&gt;`
//! inside a label can never close a token.

use std::sync::Arc;

use {
    futures::future::join_all,
    slackbridge_channels::Mention,
    tracing::warn,
};

use crate::{
    cache::{ConversationCache, EntityCache},
    config::BotSelf,
    event::Attachment,
};

const BROADCASTS: &[&str] = &["everyone", "channel", "group", "here"];

/// Display text plus the entity references found while producing it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedText {
    pub text: String,
    /// User and conversation references in order of appearance.
    pub mentions: Vec<Mention>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sigil {
    User,
    Conversation,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token<'a> {
    /// The whole token including brackets, as received.
    raw: &'a str,
    sigil: Option<Sigil>,
    link: &'a str,
    label: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Token(Token<'a>),
}

/// Split `text` into literal runs and markup tokens.
///
/// A token is `<`, an optional sigil, a non-empty link without `|`, and an
/// optional non-empty `|label`, closed by `>`. Anything else stays literal.
fn tokenize(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find('<') {
        let open = cursor + offset;
        let rest = &text[open + 1..];
        let Some(close) = rest.find(['<', '>']) else {
            break;
        };
        if rest.as_bytes()[close] == b'<' {
            cursor = open + 1 + close;
            continue;
        }

        let end = open + 1 + close + 1;
        if let Some(token) = parse_token(&text[open..end]) {
            if literal_start < open {
                segments.push(Segment::Literal(&text[literal_start..open]));
            }
            segments.push(Segment::Token(token));
            literal_start = end;
        }
        cursor = end;
    }

    if literal_start < text.len() {
        segments.push(Segment::Literal(&text[literal_start..]));
    }
    segments
}

fn parse_token(raw: &str) -> Option<Token<'_>> {
    let inner = &raw[1..raw.len() - 1];
    let (sigil, body) = match inner.as_bytes().first() {
        Some(b'@') => (Some(Sigil::User), &inner[1..]),
        Some(b'#') => (Some(Sigil::Conversation), &inner[1..]),
        Some(b'!') => (Some(Sigil::Special), &inner[1..]),
        _ => (None, inner),
    };
    let (link, label) = match body.split_once('|') {
        Some((link, label)) => (link, Some(label)),
        None => (body, None),
    };
    if link.is_empty() || label.is_some_and(str::is_empty) {
        return None;
    }
    Some(Token {
        raw,
        sigil,
        link,
        label,
    })
}

/// Decode the three entities Slack escapes. Single pass, so `&amp;lt;`
/// becomes `&lt;` rather than `<`.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        let (decoded, len) = if rest.starts_with("&amp;") {
            ('&', 5)
        } else if rest.starts_with("&lt;") {
            ('<', 4)
        } else if rest.starts_with("&gt;") {
            ('>', 4)
        } else {
            ('&', 1)
        };
        out.push(decoded);
        rest = &rest[len..];
    }
    out.push_str(rest);
    out
}

/// Append attachment fallbacks below the message text.
///
/// A message without text but with attachments starts with a line break.
pub fn flatten_attachments(text: Option<&str>, attachments: &[Attachment]) -> String {
    let mut out = text.unwrap_or_default().to_string();
    let fallbacks = attachments
        .iter()
        .map(|attachment| attachment.fallback.as_deref().unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\n");
    if !fallbacks.is_empty() {
        out.push('\n');
        out.push_str(&fallbacks);
    }
    out
}

fn render_link(link: &str, label: Option<&str>) -> String {
    let link = decode_entities(link);
    let link = link.strip_prefix("mailto:").unwrap_or(&link);
    match label.map(decode_entities) {
        Some(label) if !link.contains(label.as_str()) => format!("{label} ({link})"),
        _ => link.to_string(),
    }
}

fn render_special(token: &Token<'_>) -> Option<String> {
    if BROADCASTS.contains(&token.link) {
        return Some(format!("@{}", token.link));
    }
    let label = decode_entities(token.label?);
    if token.link.starts_with("subteam^") && !label.starts_with('@') {
        return Some(format!("@{label}"));
    }
    Some(label)
}

/// Resolves mention tokens against the caches and renders display text.
pub struct MentionRewriter {
    users: Arc<EntityCache>,
    conversations: Arc<ConversationCache>,
    bot: Option<BotSelf>,
}

impl MentionRewriter {
    pub fn new(users: Arc<EntityCache>, conversations: Arc<ConversationCache>) -> Self {
        Self {
            users,
            conversations,
            bot: None,
        }
    }

    /// Render `<@BOT_USER_ID>` as the bot's own name without a lookup.
    #[must_use]
    pub fn with_bot(mut self, bot: BotSelf) -> Self {
        self.bot = Some(bot);
        self
    }

    /// Display text and mentions for a message body and its attachments.
    pub async fn build_text(&self, raw: Option<&str>, attachments: &[Attachment]) -> RenderedText {
        self.rewrite(&flatten_attachments(raw, attachments)).await
    }

    /// Display text only.
    pub async fn replace_links(&self, raw: &str) -> String {
        self.rewrite(raw).await.text
    }

    /// Lookups for all tokens run concurrently; output keeps token order.
    pub async fn rewrite(&self, raw: &str) -> RenderedText {
        let segments = tokenize(raw);
        let rendered = join_all(segments.iter().map(|segment| self.render(segment))).await;

        let mut out = RenderedText::default();
        for (text, mention) in rendered {
            out.text.push_str(&text);
            out.mentions.extend(mention);
        }
        out
    }

    async fn render(&self, segment: &Segment<'_>) -> (String, Option<Mention>) {
        let token = match segment {
            Segment::Literal(text) => return (decode_entities(text), None),
            Segment::Token(token) => token,
        };
        match token.sigil {
            Some(Sigil::User) => self.render_user(token).await,
            Some(Sigil::Conversation) => self.render_conversation(token).await,
            Some(Sigil::Special) => (
                render_special(token).unwrap_or_else(|| token.raw.to_string()),
                None,
            ),
            None => (render_link(token.link, token.label), None),
        }
    }

    async fn render_user(&self, token: &Token<'_>) -> (String, Option<Mention>) {
        let user_id = token.link;
        if let Some(label) = token.label {
            return (
                format!("@{}", decode_entities(label)),
                Some(Mention::user(user_id, None)),
            );
        }
        if let Some(bot) = self.bot.as_ref().filter(|bot| bot.user_id == user_id) {
            return (format!("@{}", bot.name), Some(Mention::user(user_id, None)));
        }
        match self.users.fetch(user_id).await {
            Ok(lookup) => {
                let user = lookup.into_inner();
                (
                    format!("@{}", user.display_name()),
                    Some(Mention::user(user_id, Some(user))),
                )
            },
            Err(e) => {
                warn!(user_id, error = %e, "could not resolve user mention");
                (token.raw.to_string(), None)
            },
        }
    }

    async fn render_conversation(&self, token: &Token<'_>) -> (String, Option<Mention>) {
        let conversation_id = token.link;
        if let Some(label) = token.label {
            return (
                format!("#{}", decode_entities(label)),
                Some(Mention::conversation(conversation_id, None)),
            );
        }
        match self.conversations.fetch(conversation_id).await {
            Ok(lookup) => {
                let conversation = lookup.into_inner();
                (
                    format!("#{}", conversation.display_name()),
                    Some(Mention::conversation(conversation_id, Some(conversation))),
                )
            },
            Err(e) => {
                warn!(conversation_id, error = %e, "could not resolve conversation mention");
                (token.raw.to_string(), None)
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::FakeDirectory,
        rstest::rstest,
        slackbridge_channels::{MentionInfo, MentionKind},
        std::time::Duration,
    };

    fn rewriter() -> (Arc<FakeDirectory>, MentionRewriter) {
        let directory = Arc::new(
            FakeDirectory::default()
                .with_user("U123", "name")
                .with_channel("C123", "general"),
        );
        let users = Arc::new(EntityCache::new(directory.clone()));
        let conversations = Arc::new(ConversationCache::new(
            directory.clone(),
            Duration::from_secs(300),
        ));
        let rewriter = MentionRewriter::new(users, conversations).with_bot(BotSelf {
            user_id: "UBOT".into(),
            name: "hubot".into(),
            team_id: None,
        });
        (directory, rewriter)
    }

    fn attachment(fallback: Option<&str>) -> Attachment {
        Attachment {
            fallback: fallback.map(Into::into),
            ..Attachment::default()
        }
    }

    #[rstest]
    #[case("foo &gt; &amp; &lt; &gt;&amp;&lt;", "foo > & < >&<")]
    #[case("foo &amp;lt; bar", "foo &lt; bar")]
    #[case("foo <http://www.example.com> bar", "foo http://www.example.com bar")]
    #[case("foo <https://www.example.com> bar", "foo https://www.example.com bar")]
    #[case("foo <skype:echo123?call> bar", "foo skype:echo123?call bar")]
    #[case("foo <https://www.example.com|label> bar", "foo label (https://www.example.com) bar")]
    #[case("foo <https://www.example.com|example.com> bar", "foo https://www.example.com bar")]
    #[case(
        "foo <https://www.example.com|label &gt; &amp; &lt;> bar",
        "foo label > & < (https://www.example.com) bar"
    )]
    #[case("foo <mailto:name@example.com> bar", "foo name@example.com bar")]
    #[case("foo <mailto:name@example.com|name@example.com> bar", "foo name@example.com bar")]
    #[case("foo <@U123> bar", "foo @name bar")]
    #[case("foo <@U123|label> bar", "foo @label bar")]
    #[case("foo <@U555> bar", "foo <@U555> bar")]
    #[case("foo <#C123> bar", "foo #general bar")]
    #[case("foo <#C123|label> bar", "foo #label bar")]
    #[case("foo <#C555> bar", "foo <#C555> bar")]
    #[case("foo <!everyone> bar", "foo @everyone bar")]
    #[case("foo <!channel> bar", "foo @channel bar")]
    #[case("foo <!group> bar", "foo @group bar")]
    #[case("foo <!here> bar", "foo @here bar")]
    #[case("foo <!subteam^S123|@subteam> bar", "foo @subteam bar")]
    #[case("foo <!subteam^S123|subteam> bar", "foo @subteam bar")]
    #[case("foo <!foobar|hello> bar", "foo hello bar")]
    #[case("foo <!foobar> bar", "foo <!foobar> bar")]
    #[case("hey <@UBOT> deploy", "hey @hubot deploy")]
    #[case(
        "foo <@U123|label> bar <#C123> <!channel> <https://www.example.com|label>",
        "foo @label bar #general @channel label (https://www.example.com)"
    )]
    #[case("a &lt;@U123&gt; b", "a <@U123> b")]
    #[case("1 < 2 <@U123>", "1 < 2 @name")]
    #[case("empty <> and <|x> stay", "empty <> and <|x> stay")]
    #[case("unclosed <@U123", "unclosed <@U123")]
    #[tokio::test]
    async fn replace_links(#[case] raw: &str, #[case] expected: &str) {
        let (_, rewriter) = rewriter();
        assert_eq!(rewriter.replace_links(raw).await, expected);
    }

    #[tokio::test]
    async fn mentions_in_order_with_duplicates() {
        let (_, rewriter) = rewriter();
        let out = rewriter
            .build_text(Some("foo <@U123> bar <#C123> baz <@U123|label> qux"), &[])
            .await;

        assert_eq!(out.text, "foo @name bar #general baz @label qux");
        let kinds: Vec<_> = out.mentions.iter().map(|m| (m.kind, m.id.as_str())).collect();
        assert_eq!(kinds, [
            (MentionKind::User, "U123"),
            (MentionKind::Conversation, "C123"),
            (MentionKind::User, "U123"),
        ]);
        assert!(matches!(out.mentions[0].info, Some(MentionInfo::User(_))));
        assert!(matches!(out.mentions[1].info, Some(MentionInfo::Conversation(_))));
        assert_eq!(out.mentions[2].info, None);
    }

    #[tokio::test]
    async fn links_and_failed_lookups_are_not_mentions() {
        let (_, rewriter) = rewriter();
        let out = rewriter
            .build_text(Some("foo <https://example.com|label> <@U555> bar"), &[])
            .await;
        assert_eq!(out.text, "foo label (https://example.com) <@U555> bar");
        assert!(out.mentions.is_empty());
    }

    #[tokio::test]
    async fn broadcasts_render_without_mention_records() {
        let (_, rewriter) = rewriter();
        let out = rewriter
            .build_text(Some("<!here> <!subteam^S1|team> <@U123>"), &[])
            .await;
        assert_eq!(out.text, "@here @team @name");
        let kinds: Vec<_> = out.mentions.iter().map(|mention| mention.kind).collect();
        assert_eq!(kinds, [MentionKind::User]);
    }

    #[tokio::test]
    async fn cached_user_is_not_refetched() {
        let (directory, rewriter) = rewriter();
        rewriter.replace_links("<@U123> <@U123>").await;
        rewriter.replace_links("<@U123>").await;
        // The first text may race its two tokens; later texts are cache hits.
        assert!(directory.user_calls() <= 2);
        let before = directory.user_calls();
        rewriter.replace_links("<@U123>").await;
        assert_eq!(directory.user_calls(), before);
    }

    #[rstest]
    #[case(Some("foo"), vec![], "foo")]
    #[case(None, vec![Some("first")], "\nfirst")]
    #[case(Some("foo bar"), vec![Some("first"), Some("second")], "foo bar\nfirst\nsecond")]
    #[case(Some("foo"), vec![None, Some("second")], "foo\n\nsecond")]
    #[case(Some("foo"), vec![None, Some("  ")], "foo\n\n  ")]
    #[case(Some("foo"), vec![Some("  ")], "foo\n  ")]
    #[case(Some("foo"), vec![None], "foo")]
    #[tokio::test]
    async fn attachments_are_flattened(
        #[case] text: Option<&str>,
        #[case] fallbacks: Vec<Option<&str>>,
        #[case] expected: &str,
    ) {
        let (_, rewriter) = rewriter();
        let attachments: Vec<_> = fallbacks.into_iter().map(attachment).collect();
        let out = rewriter.build_text(text, &attachments).await;
        assert_eq!(out.text, expected);
    }

    #[tokio::test]
    async fn attachment_markup_is_rewritten() {
        let (_, rewriter) = rewriter();
        let out = rewriter
            .build_text(Some("see"), &[attachment(Some("ping <@U123>"))])
            .await;
        assert_eq!(out.text, "see\nping @name");
        assert_eq!(out.mentions.len(), 1);
    }

    #[test]
    fn tokenizer_splits_segments() {
        let segments = tokenize("a <@U1|x> b");
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], Segment::Literal("a "));
        assert!(matches!(
            segments[1],
            Segment::Token(Token {
                sigil: Some(Sigil::User),
                link: "U1",
                label: Some("x"),
                ..
            })
        ));
        assert_eq!(segments[2], Segment::Literal(" b"));
    }
}
