use std::collections::HashMap;

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::model::RowTable;
use crate::config::SplitRatios;
use crate::error::{PipelineError, Result};

/// Row ids of the three disjoint partitions, each in ascending table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partitions {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

impl Partitions {
    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }
}

/// Two-stage stratified split of `table` on `column`.
///
/// First `ceil(holdout * n)` rows are held out from training, then
/// `ceil(test_within_holdout * holdout)` of those become the test set and the
/// rest validation. Each category keeps its share of rows on both sides of
/// every split; the same `seed` always selects the same rows.
pub fn stratified_split(
    table: &RowTable,
    column: &str,
    ratios: SplitRatios,
    seed: u64,
) -> Result<Partitions> {
    ratios.validate()?;
    let col = table.column_position(column).ok_or_else(|| {
        PipelineError::Stratification(format!("column '{column}' does not exist"))
    })?;

    let labels: Vec<String> = (0..table.len())
        .filter_map(|id| table.row(id))
        .map(|row| row[col].category().into_owned())
        .collect();

    let mut rng = StdRng::seed_from_u64(seed);
    let all: Vec<usize> = (0..table.len()).collect();

    let (train, holdout) = split_stratum(&all, &labels, ratios.holdout, &mut rng)
        .map_err(|e| stage_error("train/holdout", e))?;
    let (validation, test) =
        split_stratum(&holdout, &labels, ratios.test_within_holdout, &mut rng)
            .map_err(|e| stage_error("validation/test", e))?;

    debug!(
        "stratified split on '{column}' (seed {seed}): train={}, validation={}, test={}",
        train.len(),
        validation.len(),
        test.len()
    );
    Ok(Partitions {
        train,
        validation,
        test,
    })
}

fn stage_error(stage: &str, err: PipelineError) -> PipelineError {
    match err {
        PipelineError::Stratification(msg) => {
            PipelineError::Stratification(format!("{stage} split: {msg}"))
        }
        other => other,
    }
}

/// Split `rows` into `(kept, taken)` where `taken` holds
/// `ceil(fraction * rows.len())` rows drawn per category.
fn split_stratum(
    rows: &[usize],
    labels: &[String],
    fraction: f64,
    rng: &mut StdRng,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let n = rows.len();
    let n_taken = split_size(n, fraction);
    let n_kept = n - n_taken.min(n);

    let strata = group_by_label(rows, labels);
    if let Some((label, members)) = strata.iter().find(|(_, m)| m.len() < 2) {
        return Err(PipelineError::Stratification(format!(
            "category '{label}' has only {} row(s); at least 2 are needed",
            members.len()
        )));
    }
    if n_taken < strata.len() || n_kept < strata.len() {
        return Err(PipelineError::Stratification(format!(
            "{n} rows cannot be split into {n_kept}/{n_taken} while keeping all {} categories on both sides",
            strata.len()
        )));
    }

    let counts: Vec<usize> = strata.iter().map(|(_, m)| m.len()).collect();
    let quotas = apportion(&counts, n_taken);

    let mut kept = Vec::with_capacity(n_kept);
    let mut taken = Vec::with_capacity(n_taken);
    for ((_, mut members), quota) in strata.into_iter().zip(quotas) {
        members.shuffle(rng);
        let rest = members.split_off(quota);
        taken.extend(members);
        kept.extend(rest);
    }
    kept.sort_unstable();
    taken.sort_unstable();
    Ok((kept, taken))
}

/// Number of rows taken by a `fraction` split of `n` rows: `ceil(fraction * n)`
/// of the exact decimal product.
///
/// The `1e-9` slack absorbs float error in the product, so `0.4 * 1000` is 400
/// and `0.3 * 10` is 3. scikit-learn's `train_test_split` ceils the raw float
/// instead and would take 4 rows for `0.3 * 10`; sizes here follow the decimal
/// arithmetic (`|val| + |test| = ceil(0.4 * |full|)`).
fn split_size(n: usize, fraction: f64) -> usize {
    ((fraction * n as f64) - 1e-9).ceil().max(0.0) as usize
}

/// Rows grouped by label, groups in first-seen order.
fn group_by_label<'l>(rows: &[usize], labels: &'l [String]) -> Vec<(&'l str, Vec<usize>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();
    for &row in rows {
        let label = labels[row].as_str();
        let slot = *index.entry(label).or_insert_with(|| {
            groups.push((label, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(row);
    }
    groups
}

/// Distribute `target` units over groups proportionally to `counts`.
///
/// Each group gets the floor of its exact share; leftover units go to the
/// largest fractional remainders, earlier groups first on ties. The result
/// sums to exactly `target` and never exceeds a group's count.
fn apportion(counts: &[usize], target: usize) -> Vec<usize> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return vec![0; counts.len()];
    }

    let mut quotas: Vec<usize> = counts.iter().map(|&c| c * target / total).collect();
    let mut order: Vec<usize> = (0..counts.len()).collect();
    // Stable sort keeps first-seen order among equal remainders.
    order.sort_by_key(|&i| std::cmp::Reverse(counts[i] * target % total));

    let mut leftover = target - quotas.iter().sum::<usize>();
    for i in order.into_iter().cycle() {
        if leftover == 0 {
            break;
        }
        if quotas[i] < counts[i] {
            quotas[i] += 1;
            leftover -= 1;
        }
    }
    quotas
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::data::model::{Attribute, AttributeType, Value};

    fn protocol_table(counts: &[(&str, usize)]) -> RowTable {
        let names: Vec<String> = counts.iter().map(|(n, _)| n.to_string()).collect();
        let mut rows = Vec::new();
        // Interleave categories so table order is not grouped.
        let max = counts.iter().map(|(_, c)| *c).max().unwrap_or(0);
        let mut id = 0.0;
        for i in 0..max {
            for (name, count) in counts {
                if i < *count {
                    rows.push(vec![Value::Number(id), Value::Text(name.to_string())]);
                    id += 1.0;
                }
            }
        }
        RowTable::new(
            "test".into(),
            vec![
                Attribute {
                    name: "id".into(),
                    kind: AttributeType::Numeric,
                },
                Attribute {
                    name: "protocol_type".into(),
                    kind: AttributeType::Nominal(names),
                },
            ],
            rows,
        )
    }

    fn share(table: &RowTable, rows: &[usize], category: &str) -> f64 {
        let hits = rows
            .iter()
            .filter(|&&id| table.row(id).unwrap()[1].as_text() == Some(category))
            .count();
        hits as f64 / rows.len() as f64
    }

    #[test]
    fn splits_thousand_rows_sixty_twenty_twenty() {
        let table = protocol_table(&[("tcp", 600), ("udp", 300), ("icmp", 100)]);
        let parts =
            stratified_split(&table, "protocol_type", SplitRatios::default(), 42).unwrap();

        assert_eq!(parts.train.len(), 600);
        assert_eq!(parts.validation.len(), 200);
        assert_eq!(parts.test.len(), 200);

        for rows in [&parts.train, &parts.validation, &parts.test] {
            assert!((share(&table, rows, "tcp") - 0.6).abs() <= 0.02);
            assert!((share(&table, rows, "udp") - 0.3).abs() <= 0.02);
            assert!((share(&table, rows, "icmp") - 0.1).abs() <= 0.02);
        }
    }

    #[test]
    fn partitions_are_disjoint_and_conserve_rows() {
        let table = protocol_table(&[("tcp", 53), ("udp", 31), ("icmp", 17)]);
        let parts =
            stratified_split(&table, "protocol_type", SplitRatios::default(), 9).unwrap();

        assert_eq!(parts.total(), table.len());
        let all: HashSet<usize> = parts
            .train
            .iter()
            .chain(&parts.validation)
            .chain(&parts.test)
            .copied()
            .collect();
        assert_eq!(all.len(), table.len());
        // ceil(0.4 * 101) = 41 held out
        assert_eq!(parts.validation.len() + parts.test.len(), 41);
        assert_eq!(parts.test.len(), 21);
    }

    #[test]
    fn same_seed_same_partitions() {
        let table = protocol_table(&[("tcp", 40), ("udp", 25), ("icmp", 10)]);
        let ratios = SplitRatios::default();
        let a = stratified_split(&table, "protocol_type", ratios, 42).unwrap();
        let b = stratified_split(&table, "protocol_type", ratios, 42).unwrap();
        assert_eq!(a, b);

        let c = stratified_split(&table, "protocol_type", ratios, 43).unwrap();
        assert_eq!(c.train.len(), a.train.len());
        assert_ne!(a, c);
    }

    #[test]
    fn singleton_category_cannot_be_stratified() {
        let table = protocol_table(&[("tcp", 10), ("udp", 10), ("icmp", 1)]);
        let err = stratified_split(&table, "protocol_type", SplitRatios::default(), 42)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Stratification(msg) if msg.contains("icmp")));
    }

    #[test]
    fn unknown_column_is_a_stratification_error() {
        let table = protocol_table(&[("tcp", 10), ("udp", 10)]);
        assert!(matches!(
            stratified_split(&table, "service", SplitRatios::default(), 42),
            Err(PipelineError::Stratification(_))
        ));
    }

    #[test]
    fn too_few_rows_for_second_stage() {
        // Holdout of 2 rows cannot keep both categories on each side.
        let table = protocol_table(&[("tcp", 2), ("udp", 2)]);
        assert!(matches!(
            stratified_split(&table, "protocol_type", SplitRatios::default(), 42),
            Err(PipelineError::Stratification(_))
        ));
    }

    #[test]
    fn apportion_conserves_target() {
        assert_eq!(apportion(&[600, 300, 100], 400), vec![240, 120, 40]);
        assert_eq!(apportion(&[6, 4], 4), vec![2, 2]);
        assert_eq!(apportion(&[5, 5, 5], 4), vec![2, 1, 1]);
        let quotas = apportion(&[53, 31, 17], 41);
        assert_eq!(quotas.iter().sum::<usize>(), 41);
    }

    #[test]
    fn split_sizes_ceil_the_decimal_product() {
        assert_eq!(split_size(10, 0.3), 3);
        assert_eq!(split_size(1000, 0.4), 400);
        assert_eq!(split_size(101, 0.4), 41);
        assert_eq!(split_size(41, 0.5), 21);
        assert_eq!(split_size(4, 0.5), 2);
    }
}
