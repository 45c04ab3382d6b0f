/// A 128-bit component-set bitset: bit `i` = 1 iff the component with id `i`
/// is present. Component id 0 is reserved so that the empty archetype (mask
/// all-zero) is distinguishable from "uses component 0" (spec.md section 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ComponentMask {
    words: [u64; 2],
}

impl ComponentMask {
    pub const EMPTY: ComponentMask = ComponentMask { words: [0, 0] };

    pub fn set(&mut self, id: usize) {
        let (word, bit) = Self::locate(id);
        self.words[word] |= 1 << bit;
    }

    pub fn clear(&mut self, id: usize) {
        let (word, bit) = Self::locate(id);
        self.words[word] &= !(1 << bit);
    }

    pub fn get(&self, id: usize) -> bool {
        let (word, bit) = Self::locate(id);
        self.words[word] & (1 << bit) != 0
    }

    pub fn union(&self, other: &ComponentMask) -> ComponentMask {
        ComponentMask { words: [self.words[0] | other.words[0], self.words[1] | other.words[1]] }
    }

    pub fn difference(&self, other: &ComponentMask) -> ComponentMask {
        ComponentMask { words: [self.words[0] & !other.words[0], self.words[1] & !other.words[1]] }
    }

    /// True iff every bit set in `subset` is also set in `self` — i.e. `self`
    /// (the archetype's mask) is a superset of `subset` (the query mask).
    pub fn is_superset_of(&self, subset: &ComponentMask) -> bool {
        (self.words[0] & subset.words[0]) == subset.words[0]
            && (self.words[1] & subset.words[1]) == subset.words[1]
    }

    pub fn is_empty(&self) -> bool {
        self.words == [0, 0]
    }

    fn locate(id: usize) -> (usize, usize) {
        debug_assert!(id < 128, "component id exceeds the 128-bit mask");
        (id / 64, id % 64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superset_check_matches_bitwise_and() {
        let mut archetype = ComponentMask::EMPTY;
        archetype.set(1);
        archetype.set(2);
        archetype.set(70);
        let mut query = ComponentMask::EMPTY;
        query.set(1);
        query.set(70);
        assert!(archetype.is_superset_of(&query));
        query.set(5);
        assert!(!archetype.is_superset_of(&query));
    }
}
