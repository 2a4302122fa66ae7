use std::collections::HashSet;

use rand::Rng;

const PREFIX: &str = "image-";
const SUFFIX_LEN: usize = 5;

/// Returns a fresh `image-xxxxx` name not present in `taken`, and records it.
pub fn generate_image_name(taken: &mut HashSet<String>) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| rng.gen_range(b'a'..=b'z') as char)
            .collect();
        let name = format!("{PREFIX}{suffix}");
        if taken.insert(name.clone()) {
            return name;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_have_expected_shape() {
        let mut taken = HashSet::new();
        let name = generate_image_name(&mut taken);
        assert_eq!(name.len(), PREFIX.len() + SUFFIX_LEN);
        assert!(name.starts_with(PREFIX));
        assert!(name[PREFIX.len()..].chars().all(|c| c.is_ascii_lowercase()));
        assert!(taken.contains(&name));
    }

    #[test]
    fn names_never_repeat_within_a_set() {
        let mut taken = HashSet::new();
        for _ in 0..500 {
            generate_image_name(&mut taken);
        }
        assert_eq!(taken.len(), 500);
    }
}
