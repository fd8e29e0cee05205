//! Keyword classifier — fixed word lists per category.
//!
//! Each hyphen-separated word of the normalized text scores a point for
//! every category whose list contains it. The best score wins; ties go to
//! the earlier category in `Category::ALL`. Words that look like clock
//! times (`11am`, `7pm`, `1930`) count toward `time`.

use crate::services::tag::{self, Category};

use super::{Classifier, ClassifyError};

const TIME_WORDS: &[&str] = &[
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "weekend", "weekday", "today",
    "tonight", "tomorrow", "morning", "noon", "afternoon", "evening", "night", "midnight", "early", "late", "am", "pm",
    "oclock", "week", "next",
];

const LOCATION_WORDS: &[&str] = &[
    "park", "beach", "cafe", "coffee-shop", "shop", "downtown", "uptown", "home", "house", "apartment", "office",
    "library", "museum", "mall", "bar", "pub", "restaurant", "diner", "garden", "lake", "river", "square", "plaza",
    "station", "center", "centre", "street", "market", "rooftop", "backyard", "studio", "gym", "stadium", "theater",
    "theatre",
];

const FOOD_WORDS: &[&str] = &[
    "brunch", "breakfast", "lunch", "dinner", "pizza", "tacos", "taco", "sushi", "ramen", "burgers", "burger",
    "pasta", "bbq", "barbecue", "coffee", "tea", "drinks", "beer", "wine", "cocktails", "dessert", "ice-cream",
    "pancakes", "waffles", "thai", "indian", "mexican", "italian", "chinese", "vegan", "vegetarian", "salad", "snacks",
    "potluck", "picnic-food", "dim-sum", "noodles", "curry",
];

const ACTIVITY_WORDS: &[&str] = &[
    "hike", "hiking", "walk", "run", "bike", "cycling", "swim", "bowling", "karaoke", "movie", "movies", "cinema",
    "concert", "games", "board-games", "trivia", "picnic", "yoga", "climbing", "golf", "tennis", "soccer", "football",
    "basketball", "volleyball", "dance", "dancing", "shopping", "museum-tour", "tour", "kayak", "kayaking", "camping",
    "skating", "escape-room", "paintball", "bowl", "play", "watch", "game",
];

fn words_for(category: Category) -> &'static [&'static str] {
    match category {
        Category::Time => TIME_WORDS,
        Category::Location => LOCATION_WORDS,
        Category::Food => FOOD_WORDS,
        Category::Activity => ACTIVITY_WORDS,
    }
}

/// `11am`, `7pm`, `1930`, `9-30` style clock words.
fn looks_like_clock(word: &str) -> bool {
    let digits = word.trim_end_matches("am").trim_end_matches("pm");
    !digits.is_empty() && digits.len() <= 4 && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Deterministic, always-available classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Synchronous core of [`Classifier::classify`].
    #[must_use]
    pub fn classify_text(&self, text: &str) -> Option<Category> {
        let normalized = tag::normalize(text);
        if normalized.is_empty() {
            return None;
        }
        let words: Vec<&str> = normalized.split('-').collect();

        let score = |category: Category| -> usize {
            let list = words_for(category);
            // Whole text first, so hyphenated entries like `coffee-shop` hit.
            let whole = usize::from(list.contains(&normalized.as_str()));
            let parts = words.iter().filter(|w| list.contains(w)).count();
            let clocks = if category == Category::Time {
                words.iter().filter(|w| looks_like_clock(w)).count()
            } else {
                0
            };
            whole + parts + clocks
        };

        let mut best: Option<(Category, usize)> = None;
        for category in Category::ALL {
            let s = score(category);
            if s > 0 && best.is_none_or(|(_, top)| s > top) {
                best = Some((category, s));
            }
        }
        best.map(|(category, _)| category)
    }
}

#[async_trait::async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<Option<Category>, ClassifyError> {
        Ok(self.classify_text(text))
    }
}

#[cfg(test)]
#[path = "keyword_test.rs"]
mod tests;
