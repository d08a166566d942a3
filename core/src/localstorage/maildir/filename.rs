/*
 * filename.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of m2m, a POP3 to Maildir fetcher.
 *
 * m2m is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * m2m is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with m2m.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Unique Maildir file names: 16 random bytes as 32 lowercase hex digits.

use std::fmt::Write;

const UNIQUE_BYTES: usize = 16;

/// Generate a fresh unique name. Collisions are not checked for.
pub fn unique_name() -> Result<String, getrandom::Error> {
    let mut raw = [0u8; UNIQUE_BYTES];
    getrandom::getrandom(&mut raw)?;
    let mut name = String::with_capacity(UNIQUE_BYTES * 2);
    for b in raw {
        let _ = write!(name, "{:02x}", b);
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_fixed_length_hex() {
        let a = unique_name().unwrap();
        let b = unique_name().unwrap();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }
}
