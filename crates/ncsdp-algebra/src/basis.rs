//! Monomial bases for moment and localizing matrices.

use hashbrown::HashSet;

use crate::error::AlgebraError;
use crate::substitution::RuleSet;
use crate::symbol::{Letter, SymbolId};
use crate::word::Word;

/// Returns all words over `letters` up to the given degree.
///
/// Non-Hermitian letters contribute their adjoint to the alphabet as
/// well. Words are listed degree by degree, starting with the identity,
/// and every degree keeps the order in which words were first built.
#[must_use]
pub fn words_up_to_degree(letters: &[Letter], degree: usize) -> Vec<Word> {
    let mut alphabet: Vec<Letter> = Vec::with_capacity(2 * letters.len());
    for &letter in letters {
        alphabet.push(letter);
        if !letter.is_hermitian() {
            alphabet.push(letter.dagger());
        }
    }

    let mut words = vec![Word::identity()];
    let mut frontier = vec![Word::identity()];
    for _ in 0..degree {
        let mut seen = HashSet::new();
        let mut next = Vec::with_capacity(frontier.len() * alphabet.len());
        for word in &frontier {
            for &letter in &alphabet {
                let w = word.mul(&Word::from_letter(letter));
                if seen.insert(w.clone()) {
                    next.push(w);
                }
            }
        }
        words.extend(next.iter().cloned());
        frontier = next;
    }
    words
}

/// Generates the reduced basis of a variable group at a relaxation level.
///
/// Every word is reduced by `rules`. A word that reduces to a single
/// monomial is replaced by it, one that reduces to zero is dropped, and
/// one that reduces to a sum is kept as is. Duplicates are removed and
/// the `extra` monomials are appended.
///
/// # Errors
///
/// Propagates substitution failures.
pub fn generate_basis(
    letters: &[Letter],
    level: usize,
    rules: &RuleSet,
    extra: &[Word],
) -> Result<Vec<Word>, AlgebraError> {
    let mut basis = Vec::new();
    for word in words_up_to_degree(letters, level) {
        let reduced = rules.reduce_word(&word)?;
        if reduced.is_zero() {
            continue;
        }
        match reduced.as_monomial() {
            Some((w, _)) => basis.push(w.clone()),
            None => basis.push(word),
        }
    }
    basis.extend(extra.iter().cloned());
    Ok(unique_words(basis))
}

/// Selects the words of at most the given degree, keeping their order.
#[must_use]
pub fn pick_up_to_degree(basis: &[Word], degree: usize) -> Vec<Word> {
    basis
        .iter()
        .filter(|w| w.degree() <= degree)
        .cloned()
        .collect()
}

/// Removes duplicate words, keeping the first occurrence.
#[must_use]
pub fn unique_words(words: Vec<Word>) -> Vec<Word> {
    let mut seen = HashSet::with_capacity(words.len());
    words.into_iter().filter(|w| seen.insert(w.clone())).collect()
}

/// Finds the first group whose letters cover all of `symbols`.
///
/// An empty symbol list (a constant constraint) belongs to group 0.
#[must_use]
pub fn find_variable_group(groups: &[Vec<Letter>], symbols: &[SymbolId]) -> Option<usize> {
    if symbols.is_empty() {
        return if groups.is_empty() { None } else { Some(0) };
    }
    groups
        .iter()
        .position(|group| symbols.iter().all(|s| group.iter().any(|l| l.id() == *s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poly::Polynomial;
    use crate::substitution::SubstitutionRule;
    use crate::symbol::SymbolTable;

    #[test]
    fn test_word_counts() {
        let mut table = SymbolTable::new();
        let x = table.hermitian("X");
        let y = table.hermitian("Y");

        // 1 + 2 + 4
        assert_eq!(words_up_to_degree(&[x, y], 2).len(), 7);

        // a non-Hermitian letter doubles the alphabet
        let a = table.operator("A");
        assert_eq!(words_up_to_degree(&[a], 1).len(), 3);
    }

    #[test]
    fn test_commuting_words_deduplicate() {
        let mut table = SymbolTable::new();
        let a = table.commuting("a");
        let b = table.commuting("b");

        // 1, a, b, a^2, ab, b^2
        assert_eq!(words_up_to_degree(&[a, b], 2).len(), 6);
    }

    #[test]
    fn test_idempotent_basis_collapses() {
        let mut table = SymbolTable::new();
        let x = table.hermitian("X");
        let rules: RuleSet = std::iter::once(
            SubstitutionRule::new(Word::from_letters([x, x]), Polynomial::from(Word::from(x)))
                .unwrap(),
        )
        .collect();

        let basis = generate_basis(&[x], 2, &rules, &[]).unwrap();
        assert_eq!(basis, vec![Word::identity(), Word::from(x)]);
    }

    #[test]
    fn test_extra_monomials_appended() {
        let mut table = SymbolTable::new();
        let x = table.hermitian("X");
        let y = table.hermitian("Y");
        let xy = Word::from_letters([x, y]);

        let basis = generate_basis(&[x, y], 1, &RuleSet::new(), &[xy.clone(), Word::from(x)]).unwrap();
        assert_eq!(basis.len(), 4);
        assert_eq!(basis[3], xy);
        assert_eq!(pick_up_to_degree(&basis, 0), vec![Word::identity()]);
    }

    #[test]
    fn test_find_variable_group() {
        let mut table = SymbolTable::new();
        let x = table.hermitian("X");
        let y = table.hermitian("Y");
        let z = table.hermitian("Z");
        let groups = vec![vec![x, y], vec![z]];

        assert_eq!(find_variable_group(&groups, &[y.id()]), Some(0));
        assert_eq!(find_variable_group(&groups, &[z.id()]), Some(1));
        assert_eq!(find_variable_group(&groups, &[x.id(), z.id()]), None);
        assert_eq!(find_variable_group(&groups, &[]), Some(0));
    }
}
