//! Stack Configuration
//!
//! The serde/YAML boundary. String-backed kinds and references arrive here
//! and are mapped onto the closed engine enums; unknown kinds, missing
//! amounts, and dangling references are rejected with [`ConfigError`] before
//! a [`Stack`] is built.
//!
//! ```yaml
//! root: store
//! qualifications:
//!   meal-main:
//!     rules:
//!       - has-any: [main]
//! layers:
//!   - reference: store
//!     output: pass-through
//!     promotions:
//!       - type: direct
//!         name: 10% off food
//!         qualification:
//!           rules:
//!             - has-any: [food]
//!         discount: { kind: percentage-off, basis-points: 1000 }
//! ```

use decimal_percentage::Percentage;
use petgraph::graph::NodeIndex;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use rustc_hash::{FxHashMap, FxHashSet};
use rusty_money::{
    Money,
    iso::{self, Currency},
};
use serde::Deserialize;
use slotmap::{SecondaryMap, SlotMap};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    discounts::{GroupDiscount, SimpleDiscount},
    promotions::{
        DirectPromotion, MixAndMatchPromotion, PositionalPromotion, Promotion, PromotionKey,
        Slot, Tier, TieredThresholdPromotion, budget::PromotionBudget,
    },
    qualification::{BoolOp, Qualification, Rule},
    stack::{OutputMode, Stack, StackBuilder, StackError},
    tags::TagSet,
};

/// Errors produced while mapping configuration onto the engine types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing error.
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// A discount kind string is not one of the supported kinds.
    #[error("unknown discount kind: {0}")]
    UnknownDiscountKind(String),

    /// A monetary discount kind was configured without an amount.
    #[error("discount kind {0} requires an amount")]
    MissingAmount(String),

    /// A percentage discount kind was configured without basis points.
    #[error("discount kind {0} requires basis points")]
    MissingPercentage(String),

    /// A monetary amount string is not in the format "AMOUNT CURRENCY".
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A currency code is not a known ISO code.
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),

    /// A qualification group references a name that is not defined.
    #[error("unresolved qualification reference: {0}")]
    UnresolvedQualification(String),

    /// Named qualifications reference each other in a cycle.
    #[error("qualification reference cycle involving: {0}")]
    QualificationCycle(String),

    /// A layer references another layer that is not defined.
    #[error("unknown layer reference: {0}")]
    UnknownLayerReference(String),

    /// Two layers share the same reference.
    #[error("duplicate layer reference: {0}")]
    DuplicateLayerReference(String),

    /// A positional promotion's window size or positions are unusable.
    #[error("invalid positional configuration: {0}")]
    InvalidPositions(String),

    /// A mix-and-match slot's arity bounds are unusable.
    #[error("invalid slot arity for slot {0}: max must be >= min >= 1")]
    InvalidSlotArity(String),

    /// The assembled stack failed structural validation.
    #[error(transparent)]
    Stack(#[from] StackError),
}

/// Top-level stack configuration from YAML.
#[derive(Debug, Deserialize)]
pub struct StackConfig {
    /// Reference of the root layer.
    pub root: String,

    /// Layer definitions in declaration order.
    pub layers: Vec<LayerConfig>,

    /// Named qualifications shared between promotions.
    #[serde(default)]
    pub qualifications: FxHashMap<String, QualificationConfig>,
}

/// A single layer in the stack configuration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LayerConfig {
    /// Unique reference for this layer.
    pub reference: String,

    /// Promotions applied by this layer, in declaration order.
    #[serde(default)]
    pub promotions: Vec<PromotionConfig>,

    /// Output mode: "split" or "pass-through".
    pub output: OutputMode,

    /// Target layer for participating items (only used with "split" output).
    pub participating: Option<String>,

    /// Target layer for non-participating items (only used with "split" output).
    #[serde(alias = "non_participating")]
    pub non_participating: Option<String>,

    /// Target layer for all items (only used with "pass-through" output,
    /// optional for sink layers).
    pub next: Option<String>,
}

/// Boolean operator for configured qualifications.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoolOpConfig {
    /// All rules must match.
    #[default]
    And,

    /// At least one rule must match.
    Or,
}

/// A qualification rule tree from YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct QualificationConfig {
    /// How rules combine; defaults to `and`.
    #[serde(default)]
    pub op: BoolOpConfig,

    /// Child rules. Empty matches all items.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// A single qualification rule from YAML.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleConfig {
    /// Item must carry every listed tag.
    HasAll(Vec<String>),

    /// Item must carry at least one listed tag.
    HasAny(Vec<String>),

    /// Item must carry none of the listed tags.
    HasNone(Vec<String>),

    /// Reference to a named qualification.
    Group(String),
}

/// Either a reference to a named qualification or an inline definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum QualificationRef {
    /// Name of a qualification under the top-level `qualifications` map.
    Named(String),

    /// Inline qualification definition.
    Inline(QualificationConfig),
}

/// Discount configuration: a kind string plus the operand it needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiscountConfig {
    /// One of the supported discount kind strings.
    pub kind: String,

    /// Percentage operand in basis points (1000 = 10%).
    #[serde(default)]
    pub basis_points: Option<i64>,

    /// Monetary operand, e.g. "2.50 GBP".
    #[serde(default)]
    pub amount: Option<String>,
}

/// Budget configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BudgetConfig {
    /// Maximum number of applications.
    pub applications: Option<u32>,

    /// Maximum total discount value, e.g. "100.00 GBP".
    pub monetary: Option<String>,
}

/// A mix-and-match slot from YAML.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SlotConfig {
    /// Slot label, e.g. "main".
    pub label: String,

    /// Which items may fill the slot; omitted means any item.
    pub qualification: Option<QualificationRef>,

    /// Items required per combo; defaults to 1.
    #[serde(default = "default_slot_min")]
    pub min: usize,

    /// Optional upper bound on slot arity.
    pub max: Option<usize>,
}

fn default_slot_min() -> usize {
    1
}

/// A tiered threshold tier from YAML.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TierConfig {
    /// Which items count towards the thresholds; omitted means all items.
    pub contribution: Option<QualificationRef>,

    /// Which items receive the discount; omitted means all items.
    pub eligible: Option<QualificationRef>,

    /// Lower spend bound, inclusive, e.g. "20.00 GBP".
    pub min_spend: Option<String>,

    /// Upper spend bound, exclusive.
    pub max_spend: Option<String>,

    /// Lower count bound, inclusive.
    pub min_count: Option<u32>,

    /// Upper count bound, exclusive.
    pub max_count: Option<u32>,

    /// Group discount applied across eligible items.
    pub discount: DiscountConfig,
}

/// Promotion configuration from YAML.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PromotionConfig {
    /// Simple discount applied to every qualifying item.
    Direct {
        /// Display name for receipts.
        name: String,

        /// Which items qualify; omitted means all items.
        qualification: Option<QualificationRef>,

        /// Simple discount kind.
        discount: DiscountConfig,

        /// Budget limits; omitted means unlimited.
        #[serde(default)]
        budget: BudgetConfig,
    },

    /// Simple discount applied to positions within windows of qualifying items.
    Positional {
        /// Display name for receipts.
        name: String,

        /// Which items qualify; omitted means all items.
        qualification: Option<QualificationRef>,

        /// Window size.
        size: u16,

        /// Zero-based discounted positions within each window.
        positions: Vec<u16>,

        /// Simple discount kind.
        discount: DiscountConfig,

        /// Budget limits; omitted means unlimited.
        #[serde(default)]
        budget: BudgetConfig,
    },

    /// Group discount over combos drawn from labelled slots.
    MixAndMatch {
        /// Display name for receipts.
        name: String,

        /// Combo slots in assignment order.
        slots: Vec<SlotConfig>,

        /// Group discount kind.
        discount: DiscountConfig,

        /// Budget limits; omitted means unlimited.
        #[serde(default)]
        budget: BudgetConfig,
    },

    /// Group discount selected by spend or count thresholds.
    TieredThreshold {
        /// Display name for receipts.
        name: String,

        /// Tiers in priority order; the first met tier wins.
        tiers: Vec<TierConfig>,

        /// Budget limits; omitted means unlimited.
        #[serde(default)]
        budget: BudgetConfig,
    },
}

impl StackConfig {
    /// Parse a stack configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the text is not valid YAML or does
    /// not match the configuration schema.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_norway::from_str(text)?)
    }

    /// Build a validated [`Stack`] and a promotion display-name map.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for unknown kinds, missing operands,
    /// dangling references, or a stack that fails structural validation.
    pub fn build(
        &self,
    ) -> Result<(Stack<'static>, SecondaryMap<PromotionKey, String>), ConfigError> {
        let qualifications = resolve_named_qualifications(&self.qualifications)?;

        let mut keys = SlotMap::<PromotionKey, ()>::with_key();
        let mut names: SecondaryMap<PromotionKey, String> = SecondaryMap::new();

        let mut builder = StackBuilder::new();
        let mut layer_indices: FxHashMap<&str, NodeIndex> = FxHashMap::default();

        for layer in &self.layers {
            let mut promotions: SmallVec<[Promotion<'static>; 5]> = SmallVec::new();

            for promotion_config in &layer.promotions {
                let key = keys.insert(());
                let (name, promotion) = promotion_config.build(key, &qualifications)?;

                names.insert(key, name);
                promotions.push(promotion);
            }

            let node = builder.add_layer(layer.reference.clone(), promotions, layer.output);

            if layer_indices.insert(layer.reference.as_str(), node).is_some() {
                return Err(ConfigError::DuplicateLayerReference(layer.reference.clone()));
            }
        }

        let root = lookup_layer(&layer_indices, &self.root)?;
        builder.set_root(root);

        for layer in &self.layers {
            let from = lookup_layer(&layer_indices, &layer.reference)?;

            match layer.output {
                OutputMode::PassThrough => {
                    if let Some(next) = layer.next.as_deref() {
                        let to = lookup_layer(&layer_indices, next)?;
                        builder.connect_pass_through(from, to)?;
                    }
                }
                OutputMode::Split => {
                    match (
                        layer.participating.as_deref(),
                        layer.non_participating.as_deref(),
                    ) {
                        (Some(participating), Some(non_participating)) => {
                            let participating = lookup_layer(&layer_indices, participating)?;
                            let non_participating =
                                lookup_layer(&layer_indices, non_participating)?;

                            builder.connect_split(from, participating, non_participating)?;
                        }
                        (Some(participating), None) => {
                            let participating = lookup_layer(&layer_indices, participating)?;

                            builder.connect_split_participating_only(from, participating)?;
                        }
                        (None, Some(non_participating)) => {
                            let non_participating =
                                lookup_layer(&layer_indices, non_participating)?;

                            builder
                                .connect_split_non_participating_only(from, non_participating)?;
                        }
                        // Structural validation rejects edgeless splits.
                        (None, None) => {}
                    }
                }
            }
        }

        let stack = Stack::from_builder(builder)?;

        Ok((stack, names))
    }
}

fn lookup_layer(
    layer_indices: &FxHashMap<&str, NodeIndex>,
    reference: &str,
) -> Result<NodeIndex, ConfigError> {
    layer_indices
        .get(reference)
        .copied()
        .ok_or_else(|| ConfigError::UnknownLayerReference(reference.to_string()))
}

impl PromotionConfig {
    fn build(
        &self,
        key: PromotionKey,
        qualifications: &FxHashMap<String, Qualification>,
    ) -> Result<(String, Promotion<'static>), ConfigError> {
        match self {
            Self::Direct {
                name,
                qualification,
                discount,
                budget,
            } => {
                let promotion = DirectPromotion::new(
                    key,
                    build_qualification_ref(qualification.as_ref(), qualifications)?,
                    discount.build_simple()?,
                    budget.build()?,
                );

                Ok((name.clone(), Promotion::from(promotion)))
            }
            Self::Positional {
                name,
                qualification,
                size,
                positions,
                discount,
                budget,
            } => {
                if *size == 0 {
                    return Err(ConfigError::InvalidPositions(format!(
                        "{name}: window size must be >= 1"
                    )));
                }

                if positions.is_empty() || positions.iter().any(|p| p >= size) {
                    return Err(ConfigError::InvalidPositions(format!(
                        "{name}: positions must be non-empty offsets below the window size"
                    )));
                }

                let promotion = PositionalPromotion::new(
                    key,
                    build_qualification_ref(qualification.as_ref(), qualifications)?,
                    *size,
                    positions.iter().copied().collect(),
                    discount.build_simple()?,
                    budget.build()?,
                );

                Ok((name.clone(), Promotion::from(promotion)))
            }
            Self::MixAndMatch {
                name,
                slots,
                discount,
                budget,
            } => {
                let slots = slots
                    .iter()
                    .map(|slot| slot.build(qualifications))
                    .collect::<Result<Vec<_>, _>>()?;

                let promotion = MixAndMatchPromotion::new(
                    key,
                    slots,
                    discount.build_group()?,
                    budget.build()?,
                );

                Ok((name.clone(), Promotion::from(promotion)))
            }
            Self::TieredThreshold {
                name,
                tiers,
                budget,
            } => {
                let tiers = tiers
                    .iter()
                    .map(|tier| tier.build(qualifications))
                    .collect::<Result<Vec<_>, _>>()?;

                let promotion = TieredThresholdPromotion::new(key, tiers, budget.build()?);

                Ok((name.clone(), Promotion::from(promotion)))
            }
        }
    }
}

impl SlotConfig {
    fn build(
        &self,
        qualifications: &FxHashMap<String, Qualification>,
    ) -> Result<Slot, ConfigError> {
        if self.min == 0 || self.max.is_some_and(|max| max < self.min) {
            return Err(ConfigError::InvalidSlotArity(self.label.clone()));
        }

        Ok(Slot {
            label: self.label.clone(),
            qualification: build_qualification_ref(self.qualification.as_ref(), qualifications)?,
            min: self.min,
            max: self.max,
        })
    }
}

impl TierConfig {
    fn build(
        &self,
        qualifications: &FxHashMap<String, Qualification>,
    ) -> Result<Tier<'static>, ConfigError> {
        Ok(Tier {
            contribution: build_qualification_ref(self.contribution.as_ref(), qualifications)?,
            eligible: build_qualification_ref(self.eligible.as_ref(), qualifications)?,
            min_spend: self.min_spend.as_deref().map(parse_amount).transpose()?,
            max_spend: self.max_spend.as_deref().map(parse_amount).transpose()?,
            min_count: self.min_count,
            max_count: self.max_count,
            discount: self.discount.build_group()?,
        })
    }
}

impl DiscountConfig {
    fn build_simple(&self) -> Result<SimpleDiscount<'static>, ConfigError> {
        match self.kind.as_str() {
            "percentage-off" => Ok(SimpleDiscount::PercentageOff(self.percentage()?)),
            "amount-off" => Ok(SimpleDiscount::AmountOff(self.money()?)),
            "amount-override" => Ok(SimpleDiscount::AmountOverride(self.money()?)),
            other => Err(ConfigError::UnknownDiscountKind(other.to_string())),
        }
    }

    fn build_group(&self) -> Result<GroupDiscount<'static>, ConfigError> {
        match self.kind.as_str() {
            "percentage-off-each-item" | "percentage-off-all-items" => {
                Ok(GroupDiscount::PercentageOffEachItem(self.percentage()?))
            }
            "amount-off-each-item" => Ok(GroupDiscount::AmountOffEachItem(self.money()?)),
            "override-each-item" => Ok(GroupDiscount::OverrideEachItem(self.money()?)),
            "amount-off-total" => Ok(GroupDiscount::AmountOffTotal(self.money()?)),
            "override-total" => Ok(GroupDiscount::OverrideTotal(self.money()?)),
            "percentage-off-cheapest" => {
                Ok(GroupDiscount::PercentageOffCheapest(self.percentage()?))
            }
            "override-cheapest" => Ok(GroupDiscount::OverrideCheapest(self.money()?)),
            other => Err(ConfigError::UnknownDiscountKind(other.to_string())),
        }
    }

    fn percentage(&self) -> Result<Percentage, ConfigError> {
        let basis_points = self
            .basis_points
            .ok_or_else(|| ConfigError::MissingPercentage(self.kind.clone()))?;

        Ok(Percentage::from(Decimal::new(basis_points, 4)))
    }

    fn money(&self) -> Result<Money<'static, Currency>, ConfigError> {
        let amount = self
            .amount
            .as_deref()
            .ok_or_else(|| ConfigError::MissingAmount(self.kind.clone()))?;

        parse_amount(amount)
    }
}

impl BudgetConfig {
    fn build(&self) -> Result<PromotionBudget<'static>, ConfigError> {
        Ok(PromotionBudget {
            application_limit: self.applications,
            monetary_limit: self.monetary.as_deref().map(parse_amount).transpose()?,
            initial_consumed_count: 0,
            initial_consumed_amount: None,
        })
    }
}

/// Parse an amount string (e.g. "2.99 GBP") into [`Money`].
fn parse_amount(text: &str) -> Result<Money<'static, Currency>, ConfigError> {
    let mut parts = text.split_whitespace();

    let (Some(amount), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ConfigError::InvalidAmount(text.to_string()));
    };

    let amount = amount
        .parse::<Decimal>()
        .map_err(|_err| ConfigError::InvalidAmount(text.to_string()))?;

    let currency =
        iso::find(code).ok_or_else(|| ConfigError::UnknownCurrency(code.to_string()))?;

    let minor_units = amount
        .checked_mul(Decimal::from(10_i64.pow(u32::from(currency.exponent))))
        .and_then(|value| value.round_dp(0).to_i64())
        .ok_or_else(|| ConfigError::InvalidAmount(text.to_string()))?;

    Ok(Money::from_minor(minor_units, currency))
}

fn build_qualification_ref(
    reference: Option<&QualificationRef>,
    qualifications: &FxHashMap<String, Qualification>,
) -> Result<Qualification, ConfigError> {
    match reference {
        None => Ok(Qualification::match_all()),
        Some(QualificationRef::Named(name)) => qualifications
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnresolvedQualification(name.clone())),
        Some(QualificationRef::Inline(config)) => {
            build_qualification(config, qualifications)
        }
    }
}

/// Resolve the named qualifications map, following group references between
/// names and rejecting reference cycles.
fn resolve_named_qualifications(
    configs: &FxHashMap<String, QualificationConfig>,
) -> Result<FxHashMap<String, Qualification>, ConfigError> {
    let mut resolved: FxHashMap<String, Qualification> = FxHashMap::default();

    for name in configs.keys() {
        if !resolved.contains_key(name.as_str()) {
            let mut visiting = FxHashSet::default();

            resolve_named(name, configs, &mut visiting, &mut resolved)?;
        }
    }

    Ok(resolved)
}

fn resolve_named(
    name: &str,
    configs: &FxHashMap<String, QualificationConfig>,
    visiting: &mut FxHashSet<String>,
    resolved: &mut FxHashMap<String, Qualification>,
) -> Result<Qualification, ConfigError> {
    if let Some(done) = resolved.get(name) {
        return Ok(done.clone());
    }

    if !visiting.insert(name.to_string()) {
        return Err(ConfigError::QualificationCycle(name.to_string()));
    }

    let config = configs
        .get(name)
        .ok_or_else(|| ConfigError::UnresolvedQualification(name.to_string()))?;

    let op = match config.op {
        BoolOpConfig::And => BoolOp::And,
        BoolOpConfig::Or => BoolOp::Or,
    };

    let mut rules: SmallVec<[Rule; 2]> = SmallVec::new();

    for rule in &config.rules {
        rules.push(match rule {
            RuleConfig::HasAll(tags) => Rule::HasAll(tag_set(tags)),
            RuleConfig::HasAny(tags) => Rule::HasAny(tag_set(tags)),
            RuleConfig::HasNone(tags) => Rule::HasNone(tag_set(tags)),
            RuleConfig::Group(group) => Rule::Group(Box::new(resolve_named(
                group, configs, visiting, resolved,
            )?)),
        });
    }

    let qualification = Qualification::new(op, rules);

    visiting.remove(name);
    resolved.insert(name.to_string(), qualification.clone());

    Ok(qualification)
}

/// Build an inline qualification against the fully resolved named map.
fn build_qualification(
    config: &QualificationConfig,
    qualifications: &FxHashMap<String, Qualification>,
) -> Result<Qualification, ConfigError> {
    let op = match config.op {
        BoolOpConfig::And => BoolOp::And,
        BoolOpConfig::Or => BoolOp::Or,
    };

    let mut rules: SmallVec<[Rule; 2]> = SmallVec::new();

    for rule in &config.rules {
        rules.push(match rule {
            RuleConfig::HasAll(tags) => Rule::HasAll(tag_set(tags)),
            RuleConfig::HasAny(tags) => Rule::HasAny(tag_set(tags)),
            RuleConfig::HasNone(tags) => Rule::HasNone(tag_set(tags)),
            RuleConfig::Group(name) => Rule::Group(Box::new(
                qualifications
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnresolvedQualification(name.clone()))?,
            )),
        });
    }

    Ok(Qualification::new(op, rules))
}

fn tag_set(tags: &[String]) -> TagSet {
    TagSet::new(tags.iter().cloned())
}
