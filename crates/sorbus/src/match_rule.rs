//! Match rules, the filter expressions used to subscribe to a subset of the
//! messages flowing over a connection.

use std::fmt;

use crate::error::{name, Error, Result};
use crate::{Message, MessageKind, ObjectPathBuf};

/// The maximum `argN` index permitted by the D-Bus specification.
const MAX_ARG: u8 = 63;

/// A parsed D-Bus match rule.
///
/// Rules are written as comma-separated `key='value'` pairs over the keys
/// `type`, `sender`, `interface`, `member`, `path`, `path_namespace`,
/// `destination` and `arg0`..`arg63`.
///
/// # Examples
///
/// ```
/// use sorbus::MatchRule;
///
/// let rule = MatchRule::parse(
///     "type='signal',interface='org.freedesktop.DBus.Properties',member='PropertiesChanged'",
/// )?;
///
/// assert_eq!(rule.to_string(), "type='signal',interface='org.freedesktop.DBus.Properties',member='PropertiesChanged'");
/// # Ok::<_, sorbus::Error>(())
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MatchRule {
    message_type: Option<RuleMessageType>,
    sender: Option<Box<str>>,
    interface: Option<Box<str>>,
    member: Option<Box<str>>,
    path: Option<ObjectPathBuf>,
    path_namespace: Option<ObjectPathBuf>,
    destination: Option<Box<str>>,
    args: Vec<(u8, Box<str>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleMessageType {
    MethodCall,
    MethodReturn,
    Error,
    Signal,
}

impl RuleMessageType {
    fn as_str(self) -> &'static str {
        match self {
            RuleMessageType::MethodCall => "method_call",
            RuleMessageType::MethodReturn => "method_return",
            RuleMessageType::Error => "error",
            RuleMessageType::Signal => "signal",
        }
    }
}

impl MatchRule {
    /// Construct an empty rule which matches every message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the rule to signals.
    #[must_use]
    pub fn with_signal_type(mut self) -> Self {
        self.message_type = Some(RuleMessageType::Signal);
        self
    }

    /// Restrict the rule to messages from the given sender.
    #[must_use]
    pub fn with_sender<S>(mut self, sender: S) -> Self
    where
        S: AsRef<str>,
    {
        self.sender = Some(sender.as_ref().into());
        self
    }

    /// Restrict the rule to messages carrying the given interface.
    #[must_use]
    pub fn with_interface<S>(mut self, interface: S) -> Self
    where
        S: AsRef<str>,
    {
        self.interface = Some(interface.as_ref().into());
        self
    }

    /// Restrict the rule to messages carrying the given member.
    #[must_use]
    pub fn with_member<S>(mut self, member: S) -> Self
    where
        S: AsRef<str>,
    {
        self.member = Some(member.as_ref().into());
        self
    }

    /// Restrict the rule to messages with the given path.
    #[must_use]
    pub fn with_path(mut self, path: ObjectPathBuf) -> Self {
        self.path = Some(path);
        self
    }

    /// Parse a match rule expression.
    pub fn parse(rule: &str) -> Result<Self> {
        let mut this = Self::new();

        for pair in split_pairs(rule)? {
            let (key, value) = pair;

            match key {
                "type" => {
                    this.message_type = Some(match value.as_str() {
                        "method_call" => RuleMessageType::MethodCall,
                        "method_return" => RuleMessageType::MethodReturn,
                        "error" => RuleMessageType::Error,
                        "signal" => RuleMessageType::Signal,
                        other => {
                            return Err(invalid_rule(&format!("unknown message type `{other}`")));
                        }
                    });
                }
                "sender" => this.sender = Some(value.into()),
                "interface" => this.interface = Some(value.into()),
                "member" => this.member = Some(value.into()),
                "path" => this.path = Some(ObjectPathBuf::new(value.as_str())?),
                "path_namespace" => {
                    this.path_namespace = Some(ObjectPathBuf::new(value.as_str())?);
                }
                "destination" => this.destination = Some(value.into()),
                key => {
                    let Some(index) = key.strip_prefix("arg") else {
                        return Err(invalid_rule(&format!("unknown key `{key}`")));
                    };

                    let Ok(index) = index.parse::<u8>() else {
                        return Err(invalid_rule(&format!("unknown key `{key}`")));
                    };

                    if index > MAX_ARG {
                        return Err(invalid_rule("argument index out of range"));
                    }

                    this.args.push((index, value.into()));
                }
            }
        }

        this.args.sort_by_key(|(index, _)| *index);
        Ok(this)
    }

    /// Test if the rule matches the given message.
    ///
    /// Sender and destination constraints are satisfied when the message
    /// does not carry the respective field, which is the case on direct
    /// peer-to-peer connections where no bus stamps them.
    pub fn matches(&self, message: &Message) -> bool {
        if let Some(t) = self.message_type {
            let actual = match message.kind() {
                MessageKind::MethodCall { .. } => RuleMessageType::MethodCall,
                MessageKind::MethodReturn { .. } => RuleMessageType::MethodReturn,
                MessageKind::Error { .. } => RuleMessageType::Error,
                MessageKind::Signal { .. } => RuleMessageType::Signal,
                MessageKind::Plain => return false,
            };

            if t != actual {
                return false;
            }
        }

        if let Some(sender) = &self.sender {
            if matches!(message.sender(), Some(s) if s != &**sender) {
                return false;
            }
        }

        if let Some(interface) = &self.interface {
            if message.interface() != Some(&**interface) {
                return false;
            }
        }

        if let Some(member) = &self.member {
            if message.member() != Some(&**member) {
                return false;
            }
        }

        if let Some(path) = &self.path {
            if message.path() != Some(&**path) {
                return false;
            }
        }

        if let Some(namespace) = &self.path_namespace {
            match message.path() {
                Some(path) if path.is_inside(namespace) => {}
                _ => return false,
            }
        }

        if let Some(destination) = &self.destination {
            if matches!(message.destination(), Some(d) if d != &**destination) {
                return false;
            }
        }

        if !self.args.is_empty() && !self.matches_args(message) {
            return false;
        }

        true
    }

    /// Match `argN` constraints against the leading string arguments of the
    /// message body.
    fn matches_args(&self, message: &Message) -> bool {
        let mut body = message.clone();

        if body.rewind(true).is_err() {
            return false;
        }

        let mut strings = Vec::new();

        loop {
            match body.try_read::<String>() {
                Ok(Some(value)) => strings.push(value),
                // A non-string argument ends the matchable prefix.
                _ => break,
            }
        }

        self.args.iter().all(|(index, expected)| {
            matches!(strings.get(*index as usize), Some(actual) if actual.as_str() == &**expected)
        })
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;

        let mut pair = |f: &mut fmt::Formatter<'_>, key: &str, value: &str| -> fmt::Result {
            if !first {
                f.write_str(",")?;
            }

            first = false;
            write!(f, "{key}='{value}'")
        };

        if let Some(t) = self.message_type {
            pair(f, "type", t.as_str())?;
        }

        if let Some(sender) = &self.sender {
            pair(f, "sender", sender)?;
        }

        if let Some(interface) = &self.interface {
            pair(f, "interface", interface)?;
        }

        if let Some(member) = &self.member {
            pair(f, "member", member)?;
        }

        if let Some(path) = &self.path {
            pair(f, "path", path.as_str())?;
        }

        if let Some(namespace) = &self.path_namespace {
            pair(f, "path_namespace", namespace.as_str())?;
        }

        if let Some(destination) = &self.destination {
            pair(f, "destination", destination)?;
        }

        for (index, value) in &self.args {
            let key = format!("arg{index}");
            pair(f, &key, value)?;
        }

        Ok(())
    }
}

fn invalid_rule(context: &str) -> Error {
    Error::new(name::INVALID_ARGS, format!("invalid match rule: {context}"))
}

/// Split a rule into `(key, value)` pairs, honoring apostrophe quoting.
fn split_pairs(rule: &str) -> Result<Vec<(&str, String)>> {
    let mut pairs = Vec::new();
    let mut rest = rule.trim();

    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else {
            return Err(invalid_rule("expected `key=value`"));
        };

        let key = rest[..eq].trim();
        rest = &rest[eq + 1..];

        let value;

        if let Some(tail) = rest.strip_prefix('\'') {
            let Some(end) = tail.find('\'') else {
                return Err(invalid_rule("unterminated quote"));
            };

            value = tail[..end].to_owned();
            rest = tail[end + 1..].trim_start();

            if let Some(tail) = rest.strip_prefix(',') {
                rest = tail.trim_start();
            } else if !rest.is_empty() {
                return Err(invalid_rule("expected `,` between pairs"));
            }
        } else {
            match rest.find(',') {
                Some(end) => {
                    value = rest[..end].trim().to_owned();
                    rest = rest[end + 1..].trim_start();
                }
                None => {
                    value = rest.trim().to_owned();
                    rest = "";
                }
            }
        }

        pairs.push((key, value));
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use crate::{Message, ObjectPath};

    use super::MatchRule;

    const PATH: &ObjectPath = ObjectPath::new_const(b"/org/example/widget");

    #[test]
    fn parse_and_serialize() -> crate::Result<()> {
        let text = "type='signal',sender=':1.5',interface='org.example',member='Changed',path='/org/example/widget',arg0='on'";
        let rule = MatchRule::parse(text)?;
        assert_eq!(rule.to_string(), text);

        assert!(MatchRule::parse("type='telegram'").is_err());
        assert!(MatchRule::parse("arg64='x'").is_err());
        assert!(MatchRule::parse("bogus='x'").is_err());
        Ok(())
    }

    #[test]
    fn signal_matching() -> crate::Result<()> {
        let rule = MatchRule::new()
            .with_signal_type()
            .with_interface("org.example")
            .with_member("Changed")
            .with_path(PATH.to_owned());

        let mut signal = Message::signal(PATH, "org.example", "Changed");
        signal.seal()?;
        assert!(rule.matches(&signal));

        let mut other = Message::signal(PATH, "org.example", "Removed");
        other.seal()?;
        assert!(!rule.matches(&other));

        let mut call = Message::method_call(PATH, "Changed").with_interface("org.example");
        call.seal()?;
        assert!(!rule.matches(&call));
        Ok(())
    }

    #[test]
    fn path_namespace_and_args() -> crate::Result<()> {
        let rule = MatchRule::parse("path_namespace='/org/example',arg0='hello'")?;

        let mut m = Message::signal(
            ObjectPath::new("/org/example/deep/child")?,
            "org.example",
            "Ping",
        );
        m.append(&"hello".to_string())?;
        m.seal()?;
        assert!(rule.matches(&m));

        let mut m = Message::signal(ObjectPath::new("/org/other")?, "org.example", "Ping");
        m.append(&"hello".to_string())?;
        m.seal()?;
        assert!(!rule.matches(&m));

        let mut m = Message::signal(
            ObjectPath::new("/org/example/deep")?,
            "org.example",
            "Ping",
        );
        m.append(&"goodbye".to_string())?;
        m.seal()?;
        assert!(!rule.matches(&m));
        Ok(())
    }
}
