use std::str::FromStr;

use naptrap_lib::destination::DestinationId;

/// One line typed into the tracker service.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Add { name: String, latitude: f64, longitude: f64 },
    List,
    Track(DestinationId),
    Untrack(DestinationId),
    Stop(DestinationId),
    Delete(DestinationId),
    Resume,
    Status,
    /// A manual position fix, for when no GPX replay is running
    Fix { latitude: f64, longitude: f64, accuracy: Option<f32> },
    Quit,
}

pub const HELP: &str = "\
commands:
  add <lat> <lon> <name>   save a destination
  list                     list destinations
  track <id>               start tracking a destination
  untrack <id>             stop tracking a destination
  stop <id>                stop a ringing alarm
  delete <id>              delete a destination
  resume                   track everything marked as tracked
  status                   show the session state
  fix <lat> <lon> [acc]    feed a position fix
  quit";

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(word) = parts.next() else {
            return Err("empty command".into());
        };

        let command = match word {
            "add" => {
                let latitude = number(parts.next(), "latitude")?;
                let longitude = number(parts.next(), "longitude")?;
                let name = parts.by_ref().collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    return Err("missing name".into());
                }
                ConsoleCommand::Add { name, latitude, longitude }
            },
            "list" => ConsoleCommand::List,
            "track" => ConsoleCommand::Track(number(parts.next(), "id")?),
            "untrack" => ConsoleCommand::Untrack(number(parts.next(), "id")?),
            "stop" => ConsoleCommand::Stop(number(parts.next(), "id")?),
            "delete" => ConsoleCommand::Delete(number(parts.next(), "id")?),
            "resume" => ConsoleCommand::Resume,
            "status" => ConsoleCommand::Status,
            "fix" => ConsoleCommand::Fix {
                latitude: number(parts.next(), "latitude")?,
                longitude: number(parts.next(), "longitude")?,
                accuracy: parts.next().map(|acc| number(Some(acc), "accuracy")).transpose()?,
            },
            "quit" | "exit" => ConsoleCommand::Quit,
            other => return Err(format!("unknown command '{other}'")),
        };

        if parts.next().is_some() {
            return Err(format!("too many arguments for '{word}'"));
        }
        Ok(command)
    }
}

fn number<T: FromStr>(part: Option<&str>, what: &str) -> Result<T, String> {
    let part = part.ok_or_else(|| format!("missing {what}"))?;
    part.parse().map_err(|_| format!("invalid {what} '{part}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!("track 3".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Track(3)));
        assert_eq!("  stop   12 ".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Stop(12)));
        assert_eq!("status".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Status));
        assert_eq!(
            "add 23.8103 90.4125 Shahbag bus stop".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::Add { name: "Shahbag bus stop".into(), latitude: 23.8103, longitude: 90.4125 })
        );
        assert_eq!(
            "fix -33.86 151.2 4.5".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::Fix { latitude: -33.86, longitude: 151.2, accuracy: Some(4.5) })
        );
        assert_eq!("fix 1 2".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Fix { latitude: 1., longitude: 2., accuracy: None }));
    }

    #[test]
    fn rejects_bad_input() {
        assert!("".parse::<ConsoleCommand>().is_err());
        assert!("track".parse::<ConsoleCommand>().is_err());
        assert!("track one".parse::<ConsoleCommand>().is_err());
        assert!("track 1 2".parse::<ConsoleCommand>().is_err());
        assert!("add 1 2".parse::<ConsoleCommand>().is_err());
        assert!("launch".parse::<ConsoleCommand>().is_err());
    }
}
