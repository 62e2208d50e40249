//! Microfunding pool aggregate and its value types.
//!
//! A pool is created by a user who automatically becomes its first `ADMIN`.
//! Members contribute towards `current_amount` and vote on disbursements
//! under the pool's [`ApprovalPolicy`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::PoolId;
use super::user::UserId;

/// Length of a join code.
pub const POOL_CODE_LEN: usize = 8;
/// Symbols a join code is drawn from.
pub const POOL_CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Maximum title length.
pub const TITLE_MAX: usize = 120;
/// Maximum description length.
pub const DESCRIPTION_MAX: usize = 2000;
/// Maximum community type length.
pub const COMMUNITY_TYPE_MAX: usize = 120;
/// Maximum number of benefit coverage entries.
pub const BENEFIT_COVERAGE_MAX_ENTRIES: usize = 20;
/// Maximum length of a single benefit coverage entry.
pub const BENEFIT_ENTRY_MAX: usize = 120;

/// Validation failures for pool inputs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolValidationError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("title must be at most {max} characters")]
    TitleTooLong { max: usize },
    #[error("description must be at most {max} characters")]
    DescriptionTooLong { max: usize },
    #[error("community type must not be empty")]
    EmptyCommunityType,
    #[error("community type must be at most {max} characters")]
    CommunityTypeTooLong { max: usize },
    #[error("max members must be greater than zero")]
    NonPositiveMaxMembers,
    #[error("contribution amount per member must not be negative")]
    NegativeContributionAmount,
    #[error("benefit coverage accepts at most {max} non-empty entries of {entry_max} characters")]
    InvalidBenefitCoverage { max: usize, entry_max: usize },
    #[error("join code must be {len} characters from A-Z and 0-9")]
    InvalidPoolCode { len: usize },
    #[error("at least one field must be provided")]
    EmptyPatch,
}

impl PoolValidationError {
    /// Name of the offending field for structured error details.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyTitle | Self::TitleTooLong { .. } => "title",
            Self::DescriptionTooLong { .. } => "description",
            Self::EmptyCommunityType | Self::CommunityTypeTooLong { .. } => "communityType",
            Self::NonPositiveMaxMembers => "maxMembers",
            Self::NegativeContributionAmount => "contributionAmountPerMember",
            Self::InvalidBenefitCoverage { .. } => "benefitCoverage",
            Self::InvalidPoolCode { .. } => "poolCode",
            Self::EmptyPatch => "body",
        }
    }
}

/// Eight-character join code drawn from `[A-Z0-9]`.
///
/// Codes are shared out of band, so parsing is case-insensitive and
/// normalises to upper case.
///
/// # Examples
/// ```
/// use healthfund::domain::PoolCode;
///
/// let code = PoolCode::parse(" ab12cd34 ").expect("valid code");
/// assert_eq!(code.as_ref(), "AB12CD34");
/// assert!(PoolCode::parse("AB12-D34").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
pub struct PoolCode(String);

impl PoolCode {
    /// Parse and normalise a join code.
    pub fn parse(raw: &str) -> Result<Self, PoolValidationError> {
        let normalised = raw.trim().to_ascii_uppercase();
        let valid = normalised.len() == POOL_CODE_LEN
            && normalised.bytes().all(|byte| POOL_CODE_ALPHABET.contains(&byte));
        if valid {
            Ok(Self(normalised))
        } else {
            Err(PoolValidationError::InvalidPoolCode { len: POOL_CODE_LEN })
        }
    }
}

impl PoolCode {
    /// Build a code from alphabet positions, each taken modulo the alphabet
    /// size. Generators use this to avoid a fallible parse.
    #[must_use]
    pub fn from_indices(indices: [usize; POOL_CODE_LEN]) -> Self {
        Self(
            indices
                .iter()
                .map(|index| char::from(POOL_CODE_ALPHABET[index % POOL_CODE_ALPHABET.len()]))
                .collect(),
        )
    }
}

impl AsRef<str> for PoolCode {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for PoolCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<PoolCode> for String {
    fn from(value: PoolCode) -> Self {
        value.0
    }
}

impl TryFrom<String> for PoolCode {
    type Error = PoolValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// How often members are expected to contribute.
///
/// Accepts the legacy Indonesian labels (`MINGGUAN`, `BULANAN`, `TAHUNAN`)
/// on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContributionPeriod {
    #[serde(alias = "MINGGUAN")]
    Weekly,
    #[serde(alias = "BULANAN")]
    Monthly,
    #[serde(alias = "TAHUNAN")]
    Annually,
}

impl ContributionPeriod {
    /// Stable storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Annually => "ANNUALLY",
        }
    }

    /// Parse a storage label, including legacy aliases.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "WEEKLY" | "MINGGUAN" => Some(Self::Weekly),
            "MONTHLY" | "BULANAN" => Some(Self::Monthly),
            "ANNUALLY" | "TAHUNAN" => Some(Self::Annually),
            _ => None,
        }
    }
}

/// Outcome of applying an approval policy to a tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOutcome {
    Approved,
    Rejected,
    Undecided,
}

/// Rule deciding when a disbursement vote is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum ApprovalPolicy {
    /// Strict majority of the member count at vote time.
    #[default]
    #[serde(rename = "VOTING_50_PERCENT")]
    Voting50Percent,
}

impl ApprovalPolicy {
    /// Stable storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Voting50Percent => "VOTING_50_PERCENT",
        }
    }

    /// Parse a storage label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        (label == "VOTING_50_PERCENT").then_some(Self::Voting50Percent)
    }

    /// Evaluate a tally against the policy.
    ///
    /// Approval is checked first; with a strict majority both sides can never
    /// pass at once.
    ///
    /// # Examples
    /// ```
    /// use healthfund::domain::{ApprovalPolicy, PolicyOutcome};
    ///
    /// let policy = ApprovalPolicy::Voting50Percent;
    /// assert_eq!(policy.evaluate(3, 0, 5), PolicyOutcome::Approved);
    /// assert_eq!(policy.evaluate(2, 2, 4), PolicyOutcome::Undecided);
    /// ```
    #[must_use]
    pub const fn evaluate(self, votes_for: u32, votes_against: u32, member_count: u32) -> PolicyOutcome {
        let members = member_count as u64;
        match self {
            Self::Voting50Percent => {
                if 2 * (votes_for as u64) > members {
                    PolicyOutcome::Approved
                } else if 2 * (votes_against as u64) > members {
                    PolicyOutcome::Rejected
                } else {
                    PolicyOutcome::Undecided
                }
            }
        }
    }
}

/// How long a disbursement stays open for voting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum VotingWindow {
    #[default]
    #[serde(rename = "24_HOURS")]
    Hours24,
    #[serde(rename = "48_HOURS")]
    Hours48,
    #[serde(rename = "72_HOURS")]
    Hours72,
    #[serde(rename = "7_DAYS")]
    Days7,
}

impl VotingWindow {
    /// Stable storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hours24 => "24_HOURS",
            Self::Hours48 => "48_HOURS",
            Self::Hours72 => "72_HOURS",
            Self::Days7 => "7_DAYS",
        }
    }

    /// Parse a storage label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "24_HOURS" => Some(Self::Hours24),
            "48_HOURS" => Some(Self::Hours48),
            "72_HOURS" => Some(Self::Hours72),
            "7_DAYS" => Some(Self::Days7),
            _ => None,
        }
    }

    /// Length of the window.
    #[must_use]
    pub fn duration(self) -> Duration {
        match self {
            Self::Hours24 => Duration::hours(24),
            Self::Hours48 => Duration::hours(48),
            Self::Hours72 => Duration::hours(72),
            Self::Days7 => Duration::days(7),
        }
    }
}

/// Whether a pool accepts new members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolStatus {
    #[default]
    Open,
    Closed,
}

impl PoolStatus {
    /// Stable storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        }
    }

    /// Parse a storage label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "OPEN" => Some(Self::Open),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Persisted pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    pub id: PoolId,
    pub title: String,
    pub description: String,
    pub community_type: String,
    pub max_members: u32,
    pub contribution_period: ContributionPeriod,
    pub contribution_amount_per_member: i64,
    pub benefit_coverage: Vec<String>,
    pub approval_policy: ApprovalPolicy,
    pub voting_window: VotingWindow,
    pub pool_code: PoolCode,
    pub current_amount: i64,
    pub status: PoolStatus,
    pub creator_user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Unvalidated pool creation input.
#[derive(Debug, Clone)]
pub struct PoolDraftInput {
    pub title: String,
    pub description: String,
    pub community_type: String,
    pub max_members: i64,
    pub contribution_period: ContributionPeriod,
    pub contribution_amount_per_member: i64,
    pub benefit_coverage: Vec<String>,
    pub approval_policy: ApprovalPolicy,
    pub voting_window: VotingWindow,
}

/// Validated pool creation input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolDraft {
    pub title: String,
    pub description: String,
    pub community_type: String,
    pub max_members: u32,
    pub contribution_period: ContributionPeriod,
    pub contribution_amount_per_member: i64,
    pub benefit_coverage: Vec<String>,
    pub approval_policy: ApprovalPolicy,
    pub voting_window: VotingWindow,
}

fn validate_title(raw: &str) -> Result<String, PoolValidationError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(PoolValidationError::EmptyTitle);
    }
    if title.chars().count() > TITLE_MAX {
        return Err(PoolValidationError::TitleTooLong { max: TITLE_MAX });
    }
    Ok(title.to_owned())
}

fn validate_description(raw: &str) -> Result<String, PoolValidationError> {
    let description = raw.trim();
    if description.chars().count() > DESCRIPTION_MAX {
        return Err(PoolValidationError::DescriptionTooLong {
            max: DESCRIPTION_MAX,
        });
    }
    Ok(description.to_owned())
}

fn validate_max_members(raw: i64) -> Result<u32, PoolValidationError> {
    if raw <= 0 {
        return Err(PoolValidationError::NonPositiveMaxMembers);
    }
    Ok(u32::try_from(raw).unwrap_or(u32::MAX))
}

fn validate_benefits(raw: Vec<String>) -> Result<Vec<String>, PoolValidationError> {
    let invalid = PoolValidationError::InvalidBenefitCoverage {
        max: BENEFIT_COVERAGE_MAX_ENTRIES,
        entry_max: BENEFIT_ENTRY_MAX,
    };
    if raw.len() > BENEFIT_COVERAGE_MAX_ENTRIES {
        return Err(invalid);
    }
    raw.into_iter()
        .map(|entry| {
            let trimmed = entry.trim();
            if trimmed.is_empty() || trimmed.chars().count() > BENEFIT_ENTRY_MAX {
                Err(invalid.clone())
            } else {
                Ok(trimmed.to_owned())
            }
        })
        .collect()
}

impl PoolDraft {
    /// Validate creation input.
    ///
    /// # Examples
    /// ```
    /// use healthfund::domain::{
    ///     ApprovalPolicy, ContributionPeriod, PoolDraft, PoolDraftInput, VotingWindow,
    /// };
    ///
    /// let draft = PoolDraft::try_new(PoolDraftInput {
    ///     title: " Family fund ".into(),
    ///     description: String::new(),
    ///     community_type: "family".into(),
    ///     max_members: 5,
    ///     contribution_period: ContributionPeriod::Monthly,
    ///     contribution_amount_per_member: 50_000,
    ///     benefit_coverage: vec!["outpatient".into()],
    ///     approval_policy: ApprovalPolicy::Voting50Percent,
    ///     voting_window: VotingWindow::Hours24,
    /// })
    /// .expect("valid draft");
    /// assert_eq!(draft.title, "Family fund");
    /// ```
    pub fn try_new(input: PoolDraftInput) -> Result<Self, PoolValidationError> {
        let community_type = input.community_type.trim();
        if community_type.is_empty() {
            return Err(PoolValidationError::EmptyCommunityType);
        }
        if community_type.chars().count() > COMMUNITY_TYPE_MAX {
            return Err(PoolValidationError::CommunityTypeTooLong {
                max: COMMUNITY_TYPE_MAX,
            });
        }
        if input.contribution_amount_per_member < 0 {
            return Err(PoolValidationError::NegativeContributionAmount);
        }
        Ok(Self {
            title: validate_title(&input.title)?,
            description: validate_description(&input.description)?,
            community_type: community_type.to_owned(),
            max_members: validate_max_members(input.max_members)?,
            contribution_period: input.contribution_period,
            contribution_amount_per_member: input.contribution_amount_per_member,
            benefit_coverage: validate_benefits(input.benefit_coverage)?,
            approval_policy: input.approval_policy,
            voting_window: input.voting_window,
        })
    }

    /// Materialise the pool record for a freshly generated id and code.
    #[must_use]
    pub fn into_pool(
        self,
        id: PoolId,
        pool_code: PoolCode,
        creator_user_id: UserId,
        now: DateTime<Utc>,
    ) -> Pool {
        Pool {
            id,
            title: self.title,
            description: self.description,
            community_type: self.community_type,
            max_members: self.max_members,
            contribution_period: self.contribution_period,
            contribution_amount_per_member: self.contribution_amount_per_member,
            benefit_coverage: self.benefit_coverage,
            approval_policy: self.approval_policy,
            voting_window: self.voting_window,
            pool_code,
            current_amount: 0,
            status: PoolStatus::Open,
            creator_user_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Unvalidated partial pool update.
#[derive(Debug, Clone, Default)]
pub struct PoolPatchInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub max_members: Option<i64>,
    pub status: Option<PoolStatus>,
}

/// Validated partial pool update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PoolPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub max_members: Option<u32>,
    pub status: Option<PoolStatus>,
}

impl PoolPatch {
    /// Validate a patch; at least one field must be present.
    pub fn try_new(input: PoolPatchInput) -> Result<Self, PoolValidationError> {
        if input.title.is_none()
            && input.description.is_none()
            && input.max_members.is_none()
            && input.status.is_none()
        {
            return Err(PoolValidationError::EmptyPatch);
        }
        Ok(Self {
            title: input.title.as_deref().map(validate_title).transpose()?,
            description: input
                .description
                .as_deref()
                .map(validate_description)
                .transpose()?,
            max_members: input.max_members.map(validate_max_members).transpose()?,
            status: input.status,
        })
    }

    /// Apply the patch to a pool, stamping `updated_at`.
    pub fn apply(self, pool: &mut Pool, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            pool.title = title;
        }
        if let Some(description) = self.description {
            pool.description = description;
        }
        if let Some(max_members) = self.max_members {
            pool.max_members = max_members;
        }
        if let Some(status) = self.status {
            pool.status = status;
        }
        pool.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn input() -> PoolDraftInput {
        PoolDraftInput {
            title: "Neighbourhood fund".into(),
            description: "Shared health costs".into(),
            community_type: "neighbourhood".into(),
            max_members: 10,
            contribution_period: ContributionPeriod::Monthly,
            contribution_amount_per_member: 25_000,
            benefit_coverage: vec!["inpatient".into()],
            approval_policy: ApprovalPolicy::Voting50Percent,
            voting_window: VotingWindow::Hours48,
        }
    }

    #[rstest]
    fn draft_rejects_non_positive_max_members(mut input: PoolDraftInput) {
        input.max_members = 0;
        assert_eq!(
            PoolDraft::try_new(input).expect_err("zero members"),
            PoolValidationError::NonPositiveMaxMembers
        );
    }

    #[rstest]
    fn draft_rejects_negative_amount(mut input: PoolDraftInput) {
        input.contribution_amount_per_member = -1;
        let err = PoolDraft::try_new(input).expect_err("negative amount");
        assert_eq!(err.field(), "contributionAmountPerMember");
    }

    #[rstest]
    fn draft_accepts_zero_amount(mut input: PoolDraftInput) {
        input.contribution_amount_per_member = 0;
        assert!(PoolDraft::try_new(input).is_ok());
    }

    #[rstest]
    fn draft_rejects_blank_benefit(mut input: PoolDraftInput) {
        input.benefit_coverage.push("  ".into());
        assert!(matches!(
            PoolDraft::try_new(input),
            Err(PoolValidationError::InvalidBenefitCoverage { .. })
        ));
    }

    #[rstest]
    fn into_pool_starts_open_and_empty(input: PoolDraftInput) {
        let draft = PoolDraft::try_new(input).expect("valid draft");
        let now = Utc::now();
        let code = PoolCode::parse("ABCD1234").expect("code");
        let pool = draft.into_pool(PoolId::random(), code, UserId::random(), now);
        assert_eq!(pool.current_amount, 0);
        assert_eq!(pool.status, PoolStatus::Open);
        assert_eq!(pool.voting_window, VotingWindow::Hours48);
        assert_eq!(pool.created_at, pool.updated_at);
    }

    #[rstest]
    #[case("abcd1234", Some("ABCD1234"))]
    #[case("ABCD123", None)]
    #[case("ABCD12345", None)]
    #[case("ABCD_234", None)]
    fn pool_code_parsing(#[case] raw: &str, #[case] expected: Option<&str>) {
        let parsed = PoolCode::parse(raw).ok();
        assert_eq!(parsed.as_ref().map(AsRef::as_ref), expected);
    }

    #[rstest]
    #[case(3, 0, 5, PolicyOutcome::Approved)]
    #[case(2, 0, 5, PolicyOutcome::Undecided)]
    #[case(0, 3, 5, PolicyOutcome::Rejected)]
    #[case(2, 2, 4, PolicyOutcome::Undecided)]
    #[case(1, 0, 1, PolicyOutcome::Approved)]
    #[case(0, 1, 1, PolicyOutcome::Rejected)]
    fn majority_thresholds(
        #[case] votes_for: u32,
        #[case] votes_against: u32,
        #[case] members: u32,
        #[case] expected: PolicyOutcome,
    ) {
        assert_eq!(
            ApprovalPolicy::Voting50Percent.evaluate(votes_for, votes_against, members),
            expected
        );
    }

    #[test]
    fn legacy_period_labels_deserialise() {
        let period: ContributionPeriod =
            serde_json::from_str("\"BULANAN\"").expect("legacy label");
        assert_eq!(period, ContributionPeriod::Monthly);
        assert_eq!(
            serde_json::to_string(&period).expect("serialise"),
            "\"MONTHLY\""
        );
    }

    #[test]
    fn empty_patch_is_rejected() {
        assert_eq!(
            PoolPatch::try_new(PoolPatchInput::default()).expect_err("empty"),
            PoolValidationError::EmptyPatch
        );
    }

    #[rstest]
    fn patch_applies_fields(input: PoolDraftInput) {
        let mut pool = PoolDraft::try_new(input).expect("draft").into_pool(
            PoolId::random(),
            PoolCode::parse("ZZZZ9999").expect("code"),
            UserId::random(),
            Utc::now(),
        );
        let later = pool.created_at + Duration::minutes(5);
        PoolPatch::try_new(PoolPatchInput {
            title: Some("Renamed".into()),
            status: Some(PoolStatus::Closed),
            ..PoolPatchInput::default()
        })
        .expect("patch")
        .apply(&mut pool, later);
        assert_eq!(pool.title, "Renamed");
        assert_eq!(pool.status, PoolStatus::Closed);
        assert_eq!(pool.updated_at, later);
    }

    #[test]
    fn indices_wrap_around_the_alphabet() {
        let code = PoolCode::from_indices([0, 25, 26, 35, 36, 37, 71, 1]);
        assert_eq!(code.as_ref(), "AZ09AB9B");
    }
}
