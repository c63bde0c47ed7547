use crate::config::MatchingConfig;
use crate::models::{
    Catalog, DecisionKind, DecisionSet, EntryId, LineIssue, LineMatch, OrderLine,
    ResolutionState,
};
use crate::service::inventory::InventoryIndex;
use crate::service::matcher::ratio;

/// 单行解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLine {
    pub state: ResolutionState,
    pub issues: Vec<LineIssue>,
    /// 匹配到的主商品
    pub entry: Option<EntryId>,
    /// 参与分配的商品：主商品在前，其后为已授权的变体、关联商品
    pub eligible: Vec<EntryId>,
    pub confirmed: bool,
    pub needs_confirmation: bool,
}

impl ResolvedLine {
    pub fn is_resolved(&self) -> bool {
        self.state == ResolutionState::Resolved
    }
}

/// 关联商品候选 (纯目录查找，不看库存)
///
/// 规范化名称相似度达到阈值，或两者都不短于最小长度且互为子串
pub fn related_candidates(
    catalog: &Catalog,
    entry: EntryId,
    exclude: &[EntryId],
    config: &MatchingConfig,
) -> Vec<EntryId> {
    let Some(main) = catalog.get(entry) else {
        return Vec::new();
    };
    let main_name = main.normalized_name.as_str();
    let min_len = config.related_substring_min_len;

    catalog
        .entries()
        .iter()
        .enumerate()
        .filter(|(id, _)| *id != entry && !exclude.contains(id))
        .filter(|(_, other)| {
            let other_name = other.normalized_name.as_str();
            let long_enough =
                main_name.chars().count() >= min_len && other_name.chars().count() >= min_len;
            let contained = long_enough
                && (main_name.contains(other_name) || other_name.contains(main_name));
            contained || ratio(main_name, other_name) >= config.related_min_similarity
        })
        .map(|(id, _)| id)
        .collect()
}

/// 解析引擎：商品 -> 商户 -> 变体 -> 关联商品
pub struct Resolver<'a> {
    catalog: &'a Catalog,
    config: &'a MatchingConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a MatchingConfig) -> Self {
        Self { catalog, config }
    }

    /// 按状态机解析一行
    ///
    /// 库存判断基于调用时的库存索引，因此须按处理顺序逐行调用
    pub fn resolve(
        &self,
        line: &OrderLine,
        matches: &LineMatch,
        decisions: &DecisionSet,
        inventory: &InventoryIndex,
    ) -> ResolvedLine {
        let mut out = ResolvedLine {
            state: ResolutionState::Unresolved,
            issues: Vec::new(),
            entry: None,
            eligible: Vec::new(),
            confirmed: false,
            needs_confirmation: false,
        };
        let requested = line.requested();

        loop {
            let current = out.state;
            out.state = match current {
                ResolutionState::Unresolved => self.resolve_product(line, matches, decisions, &mut out),
                ResolutionState::ProductMatched => {
                    if matches.merchant.is_exact() {
                        ResolutionState::MerchantMatched
                    } else {
                        out.issues.push(LineIssue::MerchantNotMatched {
                            score: matches.merchant.result.score,
                        });
                        ResolutionState::Failed
                    }
                }
                ResolutionState::MerchantMatched => {
                    let Some(entry) = out.entry else {
                        break;
                    };
                    out.eligible.push(entry);
                    if line.is_return() || inventory.available(entry) >= requested {
                        ResolutionState::Resolved
                    } else {
                        ResolutionState::VariantCheck
                    }
                }
                ResolutionState::VariantCheck => {
                    let Some(entry) = out.entry else {
                        break;
                    };
                    for variant in self.catalog.variant_candidates(entry) {
                        if inventory.available(variant) <= 0 {
                            continue;
                        }
                        let name = self.catalog.name_of(variant);
                        if decisions.authorizes(line.line_id, DecisionKind::UseVariant, name) {
                            tracing::debug!("行 {} 使用变体 '{}'", line.line_id, name);
                            out.eligible.push(variant);
                        }
                    }
                    if inventory.available_across(&out.eligible) >= requested {
                        ResolutionState::Resolved
                    } else {
                        ResolutionState::RelatedCheck
                    }
                }
                ResolutionState::RelatedCheck => {
                    let Some(entry) = out.entry else {
                        break;
                    };
                    let mut exclude = self.catalog.variant_candidates(entry);
                    exclude.extend(out.eligible.iter().copied());
                    for related in related_candidates(self.catalog, entry, &exclude, self.config) {
                        if inventory.available(related) <= 0 {
                            continue;
                        }
                        let name = self.catalog.name_of(related);
                        if decisions.authorizes(line.line_id, DecisionKind::UseRelated, name) {
                            tracing::debug!("行 {} 使用关联商品 '{}'", line.line_id, name);
                            out.eligible.push(related);
                        }
                    }
                    ResolutionState::Resolved
                }
                ResolutionState::Resolved | ResolutionState::Failed => break,
            };
        }

        out
    }

    fn resolve_product(
        &self,
        line: &OrderLine,
        matches: &LineMatch,
        decisions: &DecisionSet,
        out: &mut ResolvedLine,
    ) -> ResolutionState {
        let product = &matches.product;

        let issue = match (product.entry, product.name.as_deref()) {
            (Some(entry), Some(name)) => {
                if product.is_fuzzy() {
                    if decisions.is_rejected(line.line_id, name) {
                        Some(LineIssue::MatchRejected {
                            score: product.score,
                        })
                    } else {
                        out.entry = Some(entry);
                        out.confirmed = decisions.is_confirmed(line.line_id, name);
                        out.needs_confirmation = !out.confirmed;
                        None
                    }
                } else {
                    out.entry = Some(entry);
                    None
                }
            }
            _ if product.score > 0 => Some(LineIssue::LowMatchScore {
                score: product.score,
            }),
            _ => Some(LineIssue::ProductNotFound),
        };

        match issue {
            None => ResolutionState::ProductMatched,
            Some(issue) => {
                out.issues.push(issue);
                // 商户问题一并记录，便于一次性修正
                if !matches.merchant.is_exact() {
                    out.issues.push(LineIssue::MerchantNotMatched {
                        score: matches.merchant.result.score,
                    });
                }
                ResolutionState::Failed
            }
        }
    }
}
