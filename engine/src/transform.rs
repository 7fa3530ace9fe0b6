//! Currency-scoped rewrite rules applied before aggregation.

use pricenode_common::{CurrencyCode, Observation};
use std::sync::Arc;
use tracing::warn;

use crate::source::SourceMeta;

/// A rule rewriting observations of exactly one currency.
pub trait RateTransformer: Send + Sync {
    /// The currency this transformer applies to.
    fn scope_currency(&self) -> &CurrencyCode;

    /// Replacement observations for `observation`. Empty drops it.
    fn apply(&self, source: &SourceMeta, observation: &Observation) -> Vec<Observation>;
}

/// Ordered set of transformers.
#[derive(Clone, Default)]
pub struct TransformPipeline {
    transformers: Vec<Arc<dyn RateTransformer>>,
}

impl TransformPipeline {
    pub fn new(transformers: Vec<Arc<dyn RateTransformer>>) -> Self {
        Self { transformers }
    }

    /// Pipeline that passes every observation through.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a transformer.
    pub fn with_transformer(mut self, transformer: Arc<dyn RateTransformer>) -> Self {
        self.transformers.push(transformer);
        self
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Route one observation through every transformer scoped to its currency.
    ///
    /// Without a matching transformer the observation is returned unchanged.
    /// Otherwise the concatenated outputs replace it. Outputs for any other
    /// currency are discarded.
    pub fn apply(&self, source: &SourceMeta, observation: Observation) -> Vec<Observation> {
        let mut matched = false;
        let mut output = Vec::new();

        for transformer in &self.transformers {
            let scope = transformer.scope_currency();
            if scope != observation.currency() {
                continue;
            }
            matched = true;

            for transformed in transformer.apply(source, &observation) {
                if transformed.currency() == scope {
                    output.push(transformed);
                } else {
                    warn!(
                        scope = %scope,
                        currency = %transformed.currency(),
                        source = %source.name,
                        "Transformer produced an observation outside its scope"
                    );
                }
            }
        }

        if matched {
            output
        } else {
            vec![observation]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricenode_common::now;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Scale {
        scope: CurrencyCode,
        factor: Decimal,
    }

    impl RateTransformer for Scale {
        fn scope_currency(&self) -> &CurrencyCode {
            &self.scope
        }

        fn apply(&self, _source: &SourceMeta, observation: &Observation) -> Vec<Observation> {
            observation
                .with_price(observation.price() * self.factor)
                .into_iter()
                .collect()
        }
    }

    struct Discard(CurrencyCode);

    impl RateTransformer for Discard {
        fn scope_currency(&self) -> &CurrencyCode {
            &self.0
        }

        fn apply(&self, _source: &SourceMeta, _observation: &Observation) -> Vec<Observation> {
            Vec::new()
        }
    }

    struct Leaky(CurrencyCode);

    impl RateTransformer for Leaky {
        fn scope_currency(&self) -> &CurrencyCode {
            &self.0
        }

        fn apply(&self, source: &SourceMeta, observation: &Observation) -> Vec<Observation> {
            vec![
                observation.clone(),
                Observation::new("USD", dec!(1), observation.timestamp(), &source.name).unwrap(),
            ]
        }
    }

    fn meta() -> SourceMeta {
        SourceMeta::new("BITSO", "bitso")
    }

    fn obs(code: &str, price: Decimal) -> Observation {
        Observation::new(code, price, now(), "BITSO").unwrap()
    }

    #[test]
    fn test_no_match_is_noop() {
        let pipeline = TransformPipeline::empty().with_transformer(Arc::new(Scale {
            scope: CurrencyCode::ars(),
            factor: dec!(2),
        }));

        for code in ["ARSB", "XARS", "USD"] {
            let input = obs(code, dec!(10));
            assert_eq!(pipeline.apply(&meta(), input.clone()), vec![input]);
        }
    }

    #[test]
    fn test_scope_matches_case_insensitively() {
        let pipeline = TransformPipeline::new(vec![Arc::new(Scale {
            scope: CurrencyCode::new("ars"),
            factor: dec!(2),
        })]);

        let output = pipeline.apply(&meta(), obs("ARS", dec!(10)));
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].price(), dec!(20));
    }

    #[test]
    fn test_all_matching_transformers_run() {
        let pipeline = TransformPipeline::new(vec![
            Arc::new(Scale {
                scope: CurrencyCode::ars(),
                factor: dec!(2),
            }),
            Arc::new(Scale {
                scope: CurrencyCode::ars(),
                factor: dec!(3),
            }),
        ]);

        let prices: Vec<Decimal> = pipeline
            .apply(&meta(), obs("ARS", dec!(10)))
            .iter()
            .map(|o| o.price())
            .collect();
        assert_eq!(prices, vec![dec!(20), dec!(30)]);
        assert_eq!(pipeline.len(), 2);
    }

    #[test]
    fn test_empty_output_drops_observation() {
        let pipeline = TransformPipeline::new(vec![Arc::new(Discard(CurrencyCode::ars()))]);
        assert!(pipeline.apply(&meta(), obs("ARS", dec!(10))).is_empty());
    }

    #[test]
    fn test_out_of_scope_outputs_discarded() {
        let pipeline = TransformPipeline::new(vec![Arc::new(Leaky(CurrencyCode::ars()))]);
        let output = pipeline.apply(&meta(), obs("ARS", dec!(10)));
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].currency(), &CurrencyCode::ars());
    }
}
