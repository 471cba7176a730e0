//! Random unique IDs for tracks, chapters, editions, attachments and segments.

use rand::Rng;

/// A random non-zero 64-bit UID.
pub fn random_uid() -> u64 {
    let mut rng = rand::thread_rng();
    loop {
        let uid: u64 = rng.gen();
        if uid != 0 {
            return uid;
        }
    }
}

/// A random 128-bit segment UID.
pub fn random_segment_uid() -> Vec<u8> {
    let mut uid = vec![0u8; 16];
    rand::thread_rng().fill(uid.as_mut_slice());
    uid
}

/// A random UID not contained in `used`; the result is added to `used`.
pub fn unique_uid(used: &mut Vec<u64>) -> u64 {
    loop {
        let uid = random_uid();
        if !used.contains(&uid) {
            used.push(uid);
            return uid;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uids() {
        assert_ne!(random_uid(), 0);
        assert_eq!(random_segment_uid().len(), 16);

        let mut used = vec![1, 2, 3];
        let uid = unique_uid(&mut used);
        assert_eq!(used.len(), 4);
        assert_eq!(used[3], uid);
    }
}
