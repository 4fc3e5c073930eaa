use super::ClaimedSet;
use crate::types::SwapEvent;

/// Searches `window` for the attacker legs bracketing `victim`.
///
/// `window` must be ordered by `OrderKey` and hold only swaps of the victim's
/// block neighbourhood. Front-runs are tried nearest first, and for the
/// chosen front-run the nearest closing back-run wins, so the result does
/// not depend on anything but the window's content.
pub fn find_pair<'a>(
    victim: &SwapEvent,
    window: &[&'a SwapEvent],
    claimed: &ClaimedSet,
) -> Option<(&'a SwapEvent, &'a SwapEvent)> {
    let before = window.partition_point(|swap| swap.key < victim.key);
    let after = window.partition_point(|swap| swap.key <= victim.key);

    window[..before]
        .iter()
        .rev()
        .filter(|front| is_front_run(victim, front, claimed))
        .find_map(|front| {
            window[after..]
                .iter()
                .find(|back| is_back_run(front, victim, back, claimed))
                .map(|back| (*front, *back))
        })
}

/// Whether `candidate` is the front-run of a complete bracket: a later swap
/// of another actor in the same direction which `candidate`'s sender closes
/// afterwards. `is_victim` filters the bracketed swaps which count.
///
/// Such a candidate is an attacker leg, so it must not be taken as the victim
/// of an enclosing bracket.
pub fn opens_bracket(
    candidate: &SwapEvent,
    window: &[&SwapEvent],
    claimed: &ClaimedSet,
    is_victim: impl Fn(&SwapEvent) -> bool,
) -> bool {
    let after = window.partition_point(|swap| swap.key <= candidate.key);
    let later = &window[after..];
    later.iter().enumerate().any(|(idx, inner)| {
        !claimed.contains(&inner.key)
            && is_front_run(inner, candidate, claimed)
            && is_victim(inner)
            && later[idx + 1..]
                .iter()
                .any(|back| is_back_run(candidate, inner, back, claimed))
    })
}

/// Another actor trading ahead of the victim in the same direction
fn is_front_run(victim: &SwapEvent, front: &SwapEvent, claimed: &ClaimedSet) -> bool {
    front.pool_id == victim.pool_id
        && front.sender_address != victim.sender_address
        && front.direction == victim.direction
        && !claimed.contains(&front.key)
}

/// The front-runner closing its position after the victim
fn is_back_run(
    front: &SwapEvent,
    victim: &SwapEvent,
    back: &SwapEvent,
    claimed: &ClaimedSet,
) -> bool {
    back.pool_id == victim.pool_id
        && back.sender_address == front.sender_address
        && back.direction == front.direction.opposite()
        && !claimed.contains(&back.key)
}
