use rand::Rng;

/// Excludes 0, I and O which read ambiguously in explorer links and
/// support tickets.
const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZ";

const LENGTH: usize = 12;

/// Generates a url-safe order id: 12 symbols drawn uniformly from a 33
/// symbol alphabet, which comes out to just over 60 bits of entropy.
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    (0..LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_has_expected_shape() {
        let id = generate();
        assert_eq!(id.len(), LENGTH);
        assert!(id.bytes().all(|byte| ALPHABET.contains(&byte)));
    }

    #[test]
    fn ids_do_not_collide_in_practice() {
        let ids: std::collections::HashSet<_> = (0..10_000).map(|_| generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn ambiguous_symbols_never_appear() {
        for _ in 0..1_000 {
            let id = generate();
            assert!(!id.contains(['0', 'I', 'O']));
        }
    }
}
