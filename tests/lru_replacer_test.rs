use ferrodb::storage::buffer::replacer::LruReplacer;

#[test]
fn test_victim_ordering_with_pins() {
    let replacer = LruReplacer::new(7);

    for frame in 1..=6 {
        replacer.unpin(frame);
    }
    // re-unpinning a tracked frame keeps its position
    replacer.unpin(1);
    assert_eq!(replacer.size(), 6);

    // a pinned frame leaves the replacer entirely
    replacer.pin(2);
    // frame 4 is still tracked, so this is a no-op
    replacer.unpin(4);
    assert_eq!(replacer.size(), 5);

    assert_eq!(replacer.victim(), Some(1));
    assert_eq!(replacer.victim(), Some(3));
    assert_eq!(replacer.victim(), Some(4));
    assert_eq!(replacer.size(), 2);
}

#[test]
fn test_pin_then_unpin_restores_membership() {
    let replacer = LruReplacer::new(4);
    replacer.unpin(1);
    replacer.unpin(2);
    replacer.unpin(3);

    replacer.pin(2);
    replacer.unpin(2);

    // same frames are present either way
    assert_eq!(replacer.size(), 3);
    let mut victims = Vec::new();
    while let Some(frame) = replacer.victim() {
        victims.push(frame);
    }
    victims.sort_unstable();
    assert_eq!(victims, vec![1, 2, 3]);
}

#[test]
fn test_empty_replacer_has_no_victim() {
    let replacer = LruReplacer::new(3);
    assert_eq!(replacer.victim(), None);

    replacer.unpin(9);
    assert_eq!(replacer.victim(), Some(9));
    assert_eq!(replacer.victim(), None);
}

#[test]
fn test_capacity_bound_evicts_oldest() {
    let replacer = LruReplacer::new(3);
    for frame in 0..5 {
        replacer.unpin(frame);
    }
    assert_eq!(replacer.size(), 3);
    assert_eq!(replacer.victim(), Some(2));
    assert_eq!(replacer.victim(), Some(3));
    assert_eq!(replacer.victim(), Some(4));
}
