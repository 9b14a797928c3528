//! Read-side aggregation for the admin surface.
//!
//! Every call loads a fresh [`UsageSnapshot`] (three bulk queries) and folds
//! it in memory. Nothing is cached between calls.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use shared::{
    config::server::AdminConfig,
    models::{
        Assistant, AssistantDetailResponse, AssistantListResponse, AssistantTranscript,
        AssistantUsage, Chat, ChatDetailResponse, ChatListResponse, ChatPageQuery, ChatSortField,
        ChatStats, ChatSummary, DailyStat, Message, MessageRole, PageQuery, Pagination,
        RecentActivity, SortOrder, StatsOverview, StatsResponse, TopConversation, UsageTotals,
        UserActivity, UserDetailResponse, UserListResponse, UserTranscript, UserUsage,
    },
    usage::{CostEstimate, Direction, PriceTable},
};
use tracing::instrument;
use uuid::Uuid;

use super::store::{ChatStore, MessageRecord, StoreResult};

const DAILY_WINDOW: u64 = 7;

fn to_count(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

fn to_tokens(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Adds one message to a running total.
pub fn add_message(totals: &mut UsageTotals, message: &Message) {
    let tokens = to_tokens(message.token_count);
    totals.total_messages += 1;
    match message.role {
        MessageRole::User => {
            totals.user_messages += 1;
            totals.user_tokens += tokens;
        }
        MessageRole::Assistant => {
            totals.assistant_messages += 1;
            totals.assistant_tokens += tokens;
        }
        MessageRole::System => {}
    }
    totals.system_prompt_tokens += to_tokens(message.system_prompt_tokens);
    totals.total_tokens = totals.user_tokens + totals.assistant_tokens + totals.system_prompt_tokens;
}

#[must_use]
pub fn fold_totals<'a>(messages: impl IntoIterator<Item = &'a Message>) -> UsageTotals {
    let mut totals = UsageTotals::default();
    for message in messages {
        add_message(&mut totals, message);
    }
    totals
}

/// Totals plus first/last activity.
#[derive(Debug, Clone, Copy, Default)]
struct Activity {
    totals: UsageTotals,
    first_seen: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
}

impl Activity {
    fn record(&mut self, message: &Message) {
        add_message(&mut self.totals, message);
        let at = message.created_at;
        self.first_seen = Some(self.first_seen.map_or(at, |first| first.min(at)));
        self.last_seen = Some(self.last_seen.map_or(at, |last| last.max(at)));
    }

    /// Only meaningful for groups built from at least one message.
    fn span(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let first = self.first_seen.unwrap_or_default();
        (first, self.last_seen.unwrap_or(first))
    }
}

/// Token totals broken down by the model they were billed against.
#[derive(Debug, Default)]
struct ModelSplit(HashMap<String, UsageTotals>);

impl ModelSplit {
    fn record(&mut self, model: &str, message: &Message) {
        add_message(self.0.entry(model.to_string()).or_default(), message);
    }

    fn cost(&self, prices: &PriceTable) -> CostEstimate {
        let (input_cost, output_cost) =
            self.0
                .iter()
                .fold((0.0, 0.0), |(input, output), (model, totals)| {
                    (
                        input + prices.calculate_cost(totals.input_tokens(), Direction::Input, model),
                        output
                            + prices.calculate_cost(
                                totals.assistant_tokens,
                                Direction::Output,
                                model,
                            ),
                    )
                });
        let total_cost = input_cost + output_cost;
        CostEstimate {
            input_cost,
            output_cost,
            total_cost,
            formatted: prices.format_cost(total_cost),
        }
    }
}

#[derive(Debug, Default)]
struct AssistantGroup {
    activity: Activity,
    chats: HashSet<Uuid>,
    users: HashMap<String, Activity>,
}

#[derive(Debug, Default)]
struct UserGroup {
    activity: Activity,
    chats: HashSet<Uuid>,
    assistants: HashSet<Uuid>,
    models: ModelSplit,
}

/// Clamps paging input and slices one page out of `items`.
#[must_use]
pub fn paginate<T>(
    items: Vec<T>,
    page: Option<i64>,
    limit: Option<i64>,
    admin: &AdminConfig,
) -> (Vec<T>, Pagination) {
    let max = i64::from(admin.max_page_size.max(1));
    let limit = limit
        .unwrap_or_else(|| i64::from(admin.default_page_size))
        .clamp(1, max);
    let page = page.unwrap_or(1).clamp(1, i64::from(u32::MAX));

    let limit = u32::try_from(limit).unwrap_or(u32::MAX);
    let page = u32::try_from(page).unwrap_or(u32::MAX);
    let total = to_count(items.len());
    let offset = usize::try_from(u64::from(page - 1) * u64::from(limit)).unwrap_or(usize::MAX);

    let slice = items
        .into_iter()
        .skip(offset)
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .collect();

    (
        slice,
        Pagination {
            page,
            limit,
            total,
            total_pages: total.div_ceil(u64::from(limit)),
        },
    )
}

fn matches_search(haystack: &str, needle: Option<&str>) -> bool {
    needle
        .map(str::trim)
        .filter(|needle| !needle.is_empty())
        .is_none_or(|needle| haystack.to_lowercase().contains(&needle.to_lowercase()))
}

/// Everything the admin views aggregate over, fetched in bulk.
#[derive(Debug, Default)]
pub struct UsageSnapshot {
    assistants: HashMap<Uuid, Assistant>,
    chats: HashMap<Uuid, Chat>,
    records: Vec<MessageRecord>,
}

impl UsageSnapshot {
    /// Fetches assistants, chats and messages with one query each.
    ///
    /// # Errors
    /// Propagates store failures.
    #[instrument(name = "analytics.load", skip(store), err)]
    pub async fn load(store: &dyn ChatStore) -> StoreResult<Self> {
        let assistants = store.list_assistants().await?;
        let chats = store.list_chats().await?;
        let records = store.message_records().await?;
        Ok(Self::new(assistants, chats, records))
    }

    #[must_use]
    pub fn new(assistants: Vec<Assistant>, chats: Vec<Chat>, records: Vec<MessageRecord>) -> Self {
        Self {
            assistants: assistants.into_iter().map(|a| (a.id, a)).collect(),
            chats: chats.into_iter().map(|c| (c.id, c)).collect(),
            records,
        }
    }

    fn assistant_name(&self, id: Option<Uuid>) -> Option<String> {
        id.and_then(|id| self.assistants.get(&id))
            .map(|assistant| assistant.name.clone())
    }

    fn model_for<'a>(&'a self, assistant_id: Option<Uuid>, prices: &'a PriceTable) -> &'a str {
        assistant_id
            .and_then(|id| self.assistants.get(&id))
            .map_or(prices.default_model(), |assistant| assistant.model.as_str())
    }

    /// Overview, 7-day histogram, busiest chats and trailing-week activity.
    #[must_use]
    pub fn stats(&self, prices: &PriceTable, now: DateTime<Utc>, top_n: usize) -> StatsResponse {
        let totals = fold_totals(self.records.iter().map(|record| &record.message));
        // Assistants and users count only once they have a message.
        let assistants: HashSet<Uuid> = self
            .records
            .iter()
            .filter_map(|record| record.assistant_id)
            .collect();
        let users: HashSet<&str> = self
            .records
            .iter()
            .map(|record| record.user_fingerprint.as_str())
            .collect();

        let overview = StatsOverview {
            total_assistants: to_count(assistants.len()),
            total_users: to_count(users.len()),
            total_conversations: to_count(self.chats.len()),
            totals,
            estimated_cost: prices.estimate(
                totals.input_tokens(),
                totals.assistant_tokens,
                prices.default_model(),
            ),
        };

        StatsResponse {
            overview,
            daily_stats: self.daily_stats(now.date_naive()),
            top_conversations: self.top_conversations(top_n),
            recent_activity: self.recent_activity(now),
        }
    }

    fn daily_stats(&self, today: NaiveDate) -> Vec<DailyStat> {
        let mut buckets: HashMap<NaiveDate, (HashSet<Uuid>, u64)> = HashMap::new();
        for record in &self.records {
            let bucket = buckets
                .entry(record.message.created_at.date_naive())
                .or_default();
            bucket.0.insert(record.message.chat_id);
            bucket.1 += 1;
        }

        (0..DAILY_WINDOW)
            .rev()
            .filter_map(|offset| today.checked_sub_days(Days::new(offset)))
            .map(|date| {
                let (conversations, messages) = buckets
                    .get(&date)
                    .map_or((0, 0), |(chats, count)| (to_count(chats.len()), *count));
                DailyStat {
                    date,
                    conversations,
                    messages,
                }
            })
            .collect()
    }

    fn top_conversations(&self, top_n: usize) -> Vec<TopConversation> {
        let mut per_chat: HashMap<Uuid, (u64, DateTime<Utc>)> = HashMap::new();
        for record in &self.records {
            let at = record.message.created_at;
            let entry = per_chat.entry(record.message.chat_id).or_insert((0, at));
            entry.0 += 1;
            entry.1 = entry.1.max(at);
        }

        let mut ranked: Vec<TopConversation> = per_chat
            .into_iter()
            .filter_map(|(chat_id, (message_count, last_activity))| {
                let chat = self.chats.get(&chat_id)?;
                Some(TopConversation {
                    chat_id,
                    title: chat.title.clone(),
                    user_fingerprint: chat.user_fingerprint.clone(),
                    assistant_id: chat.assistant_id,
                    assistant_name: self.assistant_name(chat.assistant_id),
                    message_count,
                    last_activity,
                })
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.message_count
                .cmp(&a.message_count)
                .then(b.last_activity.cmp(&a.last_activity))
                .then(a.chat_id.cmp(&b.chat_id))
        });
        ranked.truncate(top_n);
        ranked
    }

    fn recent_activity(&self, now: DateTime<Utc>) -> RecentActivity {
        let cutoff = now - Duration::days(7);
        let mut chats = HashSet::new();
        let mut messages = 0;
        for record in self
            .records
            .iter()
            .filter(|record| record.message.created_at >= cutoff)
        {
            chats.insert(record.message.chat_id);
            messages += 1;
        }

        RecentActivity {
            conversations_last_week: to_count(chats.len()),
            messages_last_week: messages,
        }
    }

    fn assistant_groups(&self) -> HashMap<Uuid, AssistantGroup> {
        let mut groups: HashMap<Uuid, AssistantGroup> = HashMap::new();
        for record in &self.records {
            let Some(assistant_id) = record.assistant_id else {
                continue;
            };
            let group = groups.entry(assistant_id).or_default();
            group.activity.record(&record.message);
            group.chats.insert(record.message.chat_id);
            group
                .users
                .entry(record.user_fingerprint.clone())
                .or_default()
                .record(&record.message);
        }
        groups
    }

    fn assistant_usage(
        &self,
        assistant: &Assistant,
        group: Option<&AssistantGroup>,
        prices: &PriceTable,
    ) -> AssistantUsage {
        let activity = group.map(|group| group.activity).unwrap_or_default();
        let mut users: Vec<UserActivity> = group
            .map(|group| {
                group
                    .users
                    .iter()
                    .map(|(fingerprint, activity)| {
                        let (first_seen, last_seen) = activity.span();
                        UserActivity {
                            fingerprint: fingerprint.clone(),
                            totals: activity.totals,
                            first_seen,
                            last_seen,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        users.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then(a.fingerprint.cmp(&b.fingerprint))
        });

        AssistantUsage {
            assistant_id: assistant.id,
            assistant_name: assistant.name.clone(),
            model: assistant.model.clone(),
            user_count: to_count(users.len()),
            conversation_count: group.map_or(0, |group| to_count(group.chats.len())),
            totals: activity.totals,
            estimated_cost: prices.estimate(
                activity.totals.input_tokens(),
                activity.totals.assistant_tokens,
                &assistant.model,
            ),
            first_seen: activity.first_seen,
            last_seen: activity.last_seen,
            users,
        }
    }

    /// Usage grouped by assistant, most recently active first.
    #[must_use]
    pub fn assistant_list(
        &self,
        prices: &PriceTable,
        query: &PageQuery,
        admin: &AdminConfig,
    ) -> AssistantListResponse {
        let groups = self.assistant_groups();
        let mut assistants: Vec<AssistantUsage> = groups
            .iter()
            .filter_map(|(id, group)| {
                let assistant = self.assistants.get(id)?;
                Some(self.assistant_usage(assistant, Some(group), prices))
            })
            .filter(|usage| matches_search(&usage.assistant_name, query.search.as_deref()))
            .collect();
        assistants.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then(a.assistant_name.cmp(&b.assistant_name))
        });

        let (assistants, pagination) = paginate(assistants, query.page, query.limit, admin);
        AssistantListResponse {
            assistants,
            pagination,
        }
    }

    fn user_groups(&self, prices: &PriceTable) -> HashMap<String, UserGroup> {
        let mut groups: HashMap<String, UserGroup> = HashMap::new();
        for record in &self.records {
            let group = groups.entry(record.user_fingerprint.clone()).or_default();
            group.activity.record(&record.message);
            group.chats.insert(record.message.chat_id);
            if let Some(assistant_id) = record.assistant_id {
                group.assistants.insert(assistant_id);
            }
            group
                .models
                .record(self.model_for(record.assistant_id, prices), &record.message);
        }
        groups
    }

    fn user_usage(fingerprint: &str, group: &UserGroup, prices: &PriceTable) -> UserUsage {
        let (first_seen, last_seen) = group.activity.span();
        UserUsage {
            fingerprint: fingerprint.to_string(),
            conversation_count: to_count(group.chats.len()),
            assistant_count: to_count(group.assistants.len()),
            totals: group.activity.totals,
            estimated_cost: group.models.cost(prices),
            first_seen,
            last_seen,
        }
    }

    /// Usage grouped by user fingerprint, most recently active first.
    #[must_use]
    pub fn user_list(
        &self,
        prices: &PriceTable,
        query: &PageQuery,
        admin: &AdminConfig,
    ) -> UserListResponse {
        let mut users: Vec<UserUsage> = self
            .user_groups(prices)
            .iter()
            .filter(|(fingerprint, _)| matches_search(fingerprint, query.search.as_deref()))
            .map(|(fingerprint, group)| Self::user_usage(fingerprint, group, prices))
            .collect();
        users.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then(a.fingerprint.cmp(&b.fingerprint))
        });

        let (users, pagination) = paginate(users, query.page, query.limit, admin);
        UserListResponse { users, pagination }
    }

    /// Drill-down for one assistant looked up by name, ignoring case.
    /// `None` when no assistant has that name.
    #[must_use]
    pub fn assistant_detail(&self, name: &str, prices: &PriceTable) -> Option<AssistantDetailResponse> {
        let wanted = name.trim().to_lowercase();
        let assistant = self
            .assistants
            .values()
            .filter(|assistant| assistant.name.to_lowercase() == wanted)
            .min_by_key(|assistant| assistant.created_at)?;

        let groups = self.assistant_groups();
        let assistant_stats = self.assistant_usage(assistant, groups.get(&assistant.id), prices);

        let mut transcripts: HashMap<&str, Vec<Message>> = HashMap::new();
        for record in self
            .records
            .iter()
            .filter(|record| record.assistant_id == Some(assistant.id))
        {
            transcripts
                .entry(record.user_fingerprint.as_str())
                .or_default()
                .push(record.message.clone());
        }

        let mut users: Vec<UserTranscript> = transcripts
            .into_iter()
            .map(|(fingerprint, mut messages)| {
                messages.sort_by_key(|message| message.created_at);
                let mut activity = Activity::default();
                messages.iter().for_each(|message| activity.record(message));
                let (first_seen, last_seen) = activity.span();
                UserTranscript {
                    fingerprint: fingerprint.to_string(),
                    totals: activity.totals,
                    first_seen,
                    last_seen,
                    messages,
                }
            })
            .collect();
        users.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then(a.fingerprint.cmp(&b.fingerprint))
        });

        Some(AssistantDetailResponse {
            assistant_stats,
            users,
        })
    }

    /// Drill-down for one user. `None` when the user has no messages.
    #[must_use]
    pub fn user_detail(&self, fingerprint: &str, prices: &PriceTable) -> Option<UserDetailResponse> {
        let groups = self.user_groups(prices);
        let group = groups.get(fingerprint)?;
        let user_stats = Self::user_usage(fingerprint, group, prices);

        let mut transcripts: HashMap<Option<Uuid>, Vec<Message>> = HashMap::new();
        for record in self
            .records
            .iter()
            .filter(|record| record.user_fingerprint == fingerprint)
        {
            transcripts
                .entry(record.assistant_id)
                .or_default()
                .push(record.message.clone());
        }

        let mut assistants: Vec<AssistantTranscript> = transcripts
            .into_iter()
            .map(|(assistant_id, mut messages)| {
                messages.sort_by_key(|message| message.created_at);
                let mut activity = Activity::default();
                messages.iter().for_each(|message| activity.record(message));
                let (first_seen, last_seen) = activity.span();
                AssistantTranscript {
                    assistant_id,
                    assistant_name: self.assistant_name(assistant_id),
                    totals: activity.totals,
                    first_seen,
                    last_seen,
                    messages,
                }
            })
            .collect();
        assistants.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then(a.assistant_id.cmp(&b.assistant_id))
        });

        Some(UserDetailResponse {
            user_stats,
            assistants,
        })
    }

    /// Chat browser with search, sort and paging.
    #[must_use]
    pub fn chat_list(&self, query: &ChatPageQuery, admin: &AdminConfig) -> ChatListResponse {
        let mut per_chat: HashMap<Uuid, (u64, Option<&Message>)> = HashMap::new();
        for record in &self.records {
            let entry = per_chat.entry(record.message.chat_id).or_default();
            entry.0 += 1;
            if entry
                .1
                .is_none_or(|last| last.created_at <= record.message.created_at)
            {
                entry.1 = Some(&record.message);
            }
        }

        let search = query.search.as_deref();
        let mut chats: Vec<ChatSummary> = self
            .chats
            .values()
            .filter(|chat| {
                matches_search(&chat.title, search)
                    || matches_search(&chat.user_fingerprint, search)
                    || matches_search(&chat.id.to_string(), search)
            })
            .map(|chat| {
                let (message_count, last_message) =
                    per_chat.get(&chat.id).copied().unwrap_or_default();
                ChatSummary {
                    chat: chat.clone(),
                    assistant_name: self.assistant_name(chat.assistant_id),
                    message_count,
                    last_message: last_message.cloned(),
                }
            })
            .collect();

        let field = query.sort_by.unwrap_or_default();
        let order = query.sort_order.unwrap_or_default();
        chats.sort_by(|a, b| {
            let ordering = match field {
                ChatSortField::UpdatedAt => a.chat.updated_at.cmp(&b.chat.updated_at),
                ChatSortField::CreatedAt => a.chat.created_at.cmp(&b.chat.created_at),
                ChatSortField::Title => a.chat.title.to_lowercase().cmp(&b.chat.title.to_lowercase()),
            }
            .then(a.chat.id.cmp(&b.chat.id));
            match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let (chats, pagination) = paginate(chats, query.page, query.limit, admin);
        ChatListResponse { chats, pagination }
    }
}

/// Detail view for one chat.
#[must_use]
pub fn chat_detail(
    chat: Chat,
    assistant: Option<Assistant>,
    messages: Vec<Message>,
    prices: &PriceTable,
) -> ChatDetailResponse {
    let totals = fold_totals(&messages);
    let model = assistant
        .as_ref()
        .map_or(prices.default_model(), |assistant| assistant.model.as_str());
    let estimated_cost = prices.estimate(totals.input_tokens(), totals.assistant_tokens, model);
    let duration_ms = (chat.updated_at - chat.created_at).num_milliseconds();

    ChatDetailResponse {
        stats: ChatStats {
            totals,
            duration_ms,
            estimated_cost,
        },
        chat,
        assistant,
        messages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    fn assistant(name: &str) -> Assistant {
        Assistant {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            system_prompt: String::new(),
            model: "gpt-4o-mini".into(),
            created_at: at(1, 0),
        }
    }

    fn chat(fingerprint: &str, assistant_id: Option<Uuid>, title: &str) -> Chat {
        Chat {
            id: Uuid::new_v4(),
            title: title.into(),
            user_fingerprint: fingerprint.into(),
            assistant_id,
            created_at: at(1, 0),
            updated_at: at(1, 0),
        }
    }

    fn record(chat: &Chat, role: MessageRole, tokens: i64, created_at: DateTime<Utc>) -> MessageRecord {
        MessageRecord {
            message: Message {
                id: Uuid::new_v4(),
                chat_id: chat.id,
                role,
                content: format!("{role} {tokens}"),
                token_count: tokens,
                system_prompt_tokens: 0,
                created_at,
            },
            user_fingerprint: chat.user_fingerprint.clone(),
            assistant_id: chat.assistant_id,
        }
    }

    fn admin() -> AdminConfig {
        AdminConfig::default()
    }

    /// Two assistants, one user: A gets 10 + 5 tokens, B gets 1.
    fn grouping_fixture() -> (UsageSnapshot, Assistant, Assistant) {
        let a = assistant("Alpha");
        let b = assistant("Beta");
        let chat_a = chat("u1", Some(a.id), "About alpha");
        let chat_b = chat("u1", Some(b.id), "About beta");
        let records = vec![
            record(&chat_a, MessageRole::User, 10, at(2, 10)),
            record(&chat_a, MessageRole::Assistant, 5, at(2, 11)),
            record(&chat_b, MessageRole::User, 1, at(3, 9)),
        ];
        let snapshot = UsageSnapshot::new(vec![a.clone(), b.clone()], vec![chat_a, chat_b], records);
        (snapshot, a, b)
    }

    #[test]
    fn groups_usage_by_assistant() {
        let (snapshot, a, b) = grouping_fixture();
        let prices = PriceTable::default();
        let list = snapshot.assistant_list(&prices, &PageQuery::default(), &admin());

        assert_eq!(list.pagination.total, 2);
        let alpha = list
            .assistants
            .iter()
            .find(|usage| usage.assistant_id == a.id)
            .unwrap();
        assert_eq!(alpha.totals.total_messages, 2);
        assert_eq!(alpha.totals.total_tokens, 15);
        assert_eq!(alpha.users.len(), 1);

        let beta = list
            .assistants
            .iter()
            .find(|usage| usage.assistant_id == b.id)
            .unwrap();
        assert_eq!(beta.totals.total_messages, 1);
        assert_eq!(beta.totals.total_tokens, 1);

        // Beta was active last.
        assert_eq!(list.assistants[0].assistant_id, b.id);
    }

    #[test]
    fn search_filters_before_paging() {
        let (snapshot, a, _) = grouping_fixture();
        let query = PageQuery {
            search: Some("ALP".into()),
            ..PageQuery::default()
        };
        let list = snapshot.assistant_list(&PriceTable::default(), &query, &admin());
        assert_eq!(list.pagination.total, 1);
        assert_eq!(list.assistants[0].assistant_id, a.id);
    }

    #[test]
    fn users_are_grouped_by_fingerprint() {
        let (snapshot, _, _) = grouping_fixture();
        let list = snapshot.user_list(&PriceTable::default(), &PageQuery::default(), &admin());
        assert_eq!(list.users.len(), 1);
        let user = &list.users[0];
        assert_eq!(user.fingerprint, "u1");
        assert_eq!(user.conversation_count, 2);
        assert_eq!(user.assistant_count, 2);
        assert_eq!(user.totals.total_tokens, 16);
        assert_eq!(user.first_seen, at(2, 10));
        assert_eq!(user.last_seen, at(3, 9));
    }

    #[test]
    fn pagination_slices_the_second_page() {
        let items: Vec<u32> = (0..45).collect();
        let (page, pagination) = paginate(items, Some(2), Some(20), &admin());
        assert_eq!(page.len(), 20);
        assert_eq!(page[0], 20);
        assert_eq!(pagination.total_pages, 3);
        assert_eq!(pagination.total, 45);
    }

    #[test]
    fn pagination_clamps_out_of_range_input() {
        let items: Vec<u32> = (0..5).collect();
        let (page, pagination) = paginate(items.clone(), Some(0), Some(1000), &admin());
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.limit, 100);
        assert_eq!(page.len(), 5);

        let (page, pagination) = paginate(items, Some(-3), Some(0), &admin());
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.limit, 1);
        assert_eq!(page, vec![0]);
        assert_eq!(pagination.total_pages, 5);

        let (page, pagination) = paginate(Vec::<u32>::new(), None, None, &admin());
        assert!(page.is_empty());
        assert_eq!(pagination.limit, 20);
        assert_eq!(pagination.total_pages, 0);
    }

    #[test]
    fn stats_cover_seven_days_ending_today() {
        let (snapshot, _, _) = grouping_fixture();
        let stats = snapshot.stats(&PriceTable::default(), at(4, 12), 10);

        assert_eq!(stats.daily_stats.len(), 7);
        assert_eq!(
            stats.daily_stats.last().unwrap().date,
            at(4, 0).date_naive()
        );
        let march_second = stats
            .daily_stats
            .iter()
            .find(|day| day.date == at(2, 0).date_naive())
            .unwrap();
        assert_eq!(march_second.messages, 2);
        assert_eq!(march_second.conversations, 1);

        assert_eq!(stats.overview.total_assistants, 2);
        assert_eq!(stats.overview.total_users, 1);
        assert_eq!(stats.overview.total_conversations, 2);
        assert_eq!(stats.overview.totals.total_tokens, 16);

        assert_eq!(stats.top_conversations.len(), 2);
        assert_eq!(stats.top_conversations[0].message_count, 2);
        assert_eq!(stats.top_conversations[0].assistant_name.as_deref(), Some("Alpha"));

        assert_eq!(stats.recent_activity.messages_last_week, 3);
        assert_eq!(stats.recent_activity.conversations_last_week, 2);
    }

    #[test]
    fn overview_counts_only_assistants_and_users_with_messages() {
        let (mut snapshot, _, _) = grouping_fixture();
        let idle = assistant("Idle");
        let empty_chat = chat("u2", Some(idle.id), "Never answered");
        snapshot.assistants.insert(idle.id, idle);
        snapshot.chats.insert(empty_chat.id, empty_chat);

        let overview = snapshot.stats(&PriceTable::default(), at(4, 12), 10).overview;
        assert_eq!(overview.total_assistants, 2);
        assert_eq!(overview.total_users, 1);
        assert_eq!(overview.total_conversations, 3);
    }

    #[test]
    fn top_conversations_break_ties_by_recency() {
        let a = assistant("Alpha");
        let older = chat("u1", Some(a.id), "older");
        let newer = chat("u2", Some(a.id), "newer");
        let records = vec![
            record(&older, MessageRole::User, 1, at(2, 8)),
            record(&newer, MessageRole::User, 1, at(2, 9)),
        ];
        let snapshot = UsageSnapshot::new(vec![a], vec![older, newer.clone()], records);
        let stats = snapshot.stats(&PriceTable::default(), at(4, 0), 1);
        assert_eq!(stats.top_conversations.len(), 1);
        assert_eq!(stats.top_conversations[0].chat_id, newer.id);
    }

    #[test]
    fn assistant_detail_matches_name_ignoring_case() {
        let (snapshot, a, _) = grouping_fixture();
        let prices = PriceTable::default();
        let detail = snapshot.assistant_detail("alpha", &prices).unwrap();
        assert_eq!(detail.assistant_stats.assistant_id, a.id);
        assert_eq!(detail.users.len(), 1);
        assert_eq!(detail.users[0].messages.len(), 2);
        assert!(snapshot.assistant_detail("gamma", &prices).is_none());
    }

    #[test]
    fn idle_assistant_detail_reports_zeroes() {
        let idle = assistant("Idle");
        let snapshot = UsageSnapshot::new(vec![idle.clone()], Vec::new(), Vec::new());
        let detail = snapshot
            .assistant_detail("idle", &PriceTable::default())
            .unwrap();
        assert_eq!(detail.assistant_stats.totals, UsageTotals::default());
        assert!(detail.assistant_stats.first_seen.is_none());
        assert!(detail.users.is_empty());
    }

    #[test]
    fn user_detail_splits_by_assistant() {
        let (snapshot, _, _) = grouping_fixture();
        let prices = PriceTable::default();
        let detail = snapshot.user_detail("u1", &prices).unwrap();
        assert_eq!(detail.assistants.len(), 2);
        assert_eq!(detail.assistants[0].assistant_name.as_deref(), Some("Beta"));
        assert!(snapshot.user_detail("nobody", &prices).is_none());
    }

    #[test]
    fn chat_list_sorts_and_searches() {
        let (snapshot, _, _) = grouping_fixture();
        let query = ChatPageQuery {
            sort_by: Some(ChatSortField::Title),
            sort_order: Some(SortOrder::Asc),
            ..ChatPageQuery::default()
        };
        let list = snapshot.chat_list(&query, &admin());
        let titles: Vec<_> = list.chats.iter().map(|c| c.chat.title.as_str()).collect();
        assert_eq!(titles, vec!["About alpha", "About beta"]);
        assert_eq!(list.chats[0].message_count, 2);
        assert_eq!(
            list.chats[0].last_message.as_ref().unwrap().role,
            MessageRole::Assistant
        );

        let query = ChatPageQuery {
            search: Some("BETA".into()),
            ..ChatPageQuery::default()
        };
        assert_eq!(snapshot.chat_list(&query, &admin()).pagination.total, 1);
    }

    #[test]
    fn chat_detail_reports_duration() {
        let mut c = chat("u1", None, "t");
        c.updated_at = c.created_at + Duration::seconds(90);
        let messages = vec![record(&c, MessageRole::User, 4, at(1, 0)).message];
        let detail = chat_detail(c, None, messages, &PriceTable::default());
        assert_eq!(detail.stats.duration_ms, 90_000);
        assert_eq!(detail.stats.totals.user_tokens, 4);
    }
}
