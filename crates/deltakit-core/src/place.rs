// crates/deltakit-core/src/place.rs

//! Command placement: assign explicit destination offsets by prefix sum, and
//! recover V-sequential order from placed commands.

use crate::types::{Command, PlacedCommand};

/// Total output size of a V-sequential command list (equals `|V|`).
#[must_use]
pub fn output_size(cmds: &[Command]) -> usize {
    cmds.iter().map(Command::output_len).sum()
}

/// Assign sequential destinations to a V-sequential command list.
///
/// `Add` payloads are deep-copied; the input list stays usable.
#[must_use]
pub fn place_commands(cmds: &[Command]) -> Vec<PlacedCommand> {
    let mut placed = Vec::with_capacity(cmds.len());
    let mut dst = 0usize;
    for cmd in cmds {
        match cmd {
            Command::Copy { offset, length } => {
                placed.push(PlacedCommand::Copy {
                    src: *offset,
                    dst,
                    length: *length,
                });
                dst += length;
            }
            Command::Add { data } => {
                placed.push(PlacedCommand::Add {
                    dst,
                    data: data.clone(),
                });
                dst += data.len();
            }
        }
    }
    placed
}

/// Recover V-sequential order from placed commands.
///
/// Sorts on `dst` (stable on ties) and strips the destinations. For any
/// well-formed placed list this is the exact inverse of [`place_commands`].
#[must_use]
pub fn unplace_commands(placed: &[PlacedCommand]) -> Vec<Command> {
    let mut ordered: Vec<&PlacedCommand> = placed.iter().collect();
    ordered.sort_by_key(|cmd| cmd.dst());
    ordered
        .into_iter()
        .map(|cmd| match cmd {
            PlacedCommand::Copy { src, length, .. } => Command::Copy {
                offset: *src,
                length: *length,
            },
            PlacedCommand::Add { data, .. } => Command::Add { data: data.clone() },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_commands() -> Vec<Command> {
        vec![
            Command::Add {
                data: b"head".to_vec(),
            },
            Command::Copy {
                offset: 100,
                length: 32,
            },
            Command::Copy {
                offset: 4,
                length: 8,
            },
            Command::Add {
                data: b"tail".to_vec(),
            },
        ]
    }

    #[test]
    fn destinations_are_prefix_sums() {
        let placed = place_commands(&sample_commands());
        let dsts: Vec<usize> = placed.iter().map(PlacedCommand::dst).collect();
        assert_eq!(dsts, vec![0, 4, 36, 44]);
    }

    #[test]
    fn destinations_partition_the_output() {
        let cmds = sample_commands();
        let placed = place_commands(&cmds);
        let mut covered = 0usize;
        for cmd in &placed {
            assert_eq!(cmd.dst(), covered);
            covered += cmd.output_len();
        }
        assert_eq!(covered, output_size(&cmds));
    }

    #[test]
    fn unplace_inverts_place() {
        let cmds = sample_commands();
        assert_eq!(unplace_commands(&place_commands(&cmds)), cmds);
    }

    #[test]
    fn unplace_sorts_shuffled_input() {
        let cmds = sample_commands();
        let mut placed = place_commands(&cmds);
        placed.reverse();
        assert_eq!(unplace_commands(&placed), cmds);
    }

    proptest! {
        #[test]
        fn place_unplace_roundtrip(
            cmds in proptest::collection::vec(
                prop_oneof![
                    (0usize..1000, 1usize..64).prop_map(|(offset, length)| Command::Copy { offset, length }),
                    proptest::collection::vec(any::<u8>(), 1..32).prop_map(|data| Command::Add { data }),
                ],
                0..40,
            )
        ) {
            prop_assert_eq!(unplace_commands(&place_commands(&cmds)), cmds);
        }
    }
}
