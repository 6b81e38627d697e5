//! Exact integer spherical shells.
//!
//! A lattice offset `(x, y, z)` belongs to shell `r` exactly when
//! `r² ≤ x² + y² + z² < (r + 1)²`, so every offset lies in exactly one
//! shell. Shell members are visited in lexicographic `(x, y, z)` order
//! over the `[-r, r]³` cube; for each `(x, y)` the valid `z` values are
//! computed directly instead of tested one by one.

use devastation_world::Offset;

/// Floor of the square root of a non-negative integer.
fn isqrt(n: i64) -> i64 {
    if n <= 0 {
        return 0;
    }
    let mut root = (n as f64).sqrt() as i64;
    while root * root > n {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= n {
        root += 1;
    }
    root
}

/// Ceiling of the square root of a non-negative integer.
fn ceil_sqrt(n: i64) -> i64 {
    let root = isqrt(n);
    if root * root < n {
        root + 1
    } else {
        root
    }
}

/// First member of shell `r` at or after `from` in lexicographic order.
#[must_use]
pub fn next_in_shell(r: i32, from: Offset) -> Option<Offset> {
    if r < 0 {
        return None;
    }
    let r64 = i64::from(r);
    let inner = r64 * r64;
    let outer = (r64 + 1) * (r64 + 1);

    for x in from[0].max(-r)..=r {
        let y_start = if x == from[0] { from[1].max(-r) } else { -r };
        for y in y_start..=r {
            let planar = i64::from(x) * i64::from(x) + i64::from(y) * i64::from(y);
            if planar >= outer {
                continue;
            }
            // |z| must lie in [low, high].
            let low = ceil_sqrt((inner - planar).max(0));
            let high = isqrt(outer - planar - 1);
            if low > high {
                continue;
            }
            let z_start = if x == from[0] && y == from[1] {
                i64::from(from[2])
            } else {
                -high
            };
            let z = if z_start <= -low {
                Some(z_start.max(-high))
            } else if z_start <= high {
                Some(z_start.max(low))
            } else {
                None
            };
            if let Some(z) = z {
                return Some([x, y, z as i32]);
            }
        }
    }
    None
}

/// Iterates the members of one shell in lexicographic order.
#[derive(Clone, Debug)]
pub struct ShellIter {
    radius: i32,
    next: Option<Offset>,
}

impl ShellIter {
    /// Iterates shell `radius` from its first member.
    #[must_use]
    pub fn new(radius: i32) -> Self {
        Self {
            radius,
            next: Some([-radius, -radius, -radius]),
        }
    }
}

impl Iterator for ShellIter {
    type Item = Offset;

    fn next(&mut self) -> Option<Offset> {
        let found = next_in_shell(self.radius, self.next?)?;
        self.next = Some([found[0], found[1], found[2] + 1]);
        Some(found)
    }
}
