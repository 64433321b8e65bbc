use std::collections::HashMap;

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{LyraError, LyraResult};
use crate::models::{Intent, Persona};

pub const DEFAULT_USER_NAME: &str = "friend";
pub const DEFAULT_SUN_SIGN: &str = "Leo";
pub const DEFAULT_MOON_SIGN: &str = "Pisces";
pub const DEFAULT_RISING_SIGN: &str = "Scorpio";
pub const DEFAULT_TRANSIT: &str = "the current planetary weather";
const UNKNOWN_TOKEN: &str = "the cosmos";
const LAST_RESORT: &str =
    "The stars are quiet for a moment. Tell me a little more about what's on your mind.";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z_]+)(?:\[(\d+)\])?\}").expect("valid placeholder regex")
});

static BUILTIN_LIBRARY: Lazy<TemplateLibrary> = Lazy::new(|| {
    let mut pools: HashMap<Persona, HashMap<Intent, Vec<String>>> = HashMap::new();
    for (persona, intents) in BUILTIN_TEMPLATES {
        let by_intent = pools.entry(*persona).or_default();
        for (intent, templates) in intents.iter() {
            by_intent.insert(
                *intent,
                templates.iter().map(|template| template.to_string()).collect(),
            );
        }
    }
    TemplateLibrary {
        pools,
        default_persona: Persona::default(),
    }
});

/// Values substituted into templates. Anything missing falls back to a
/// neutral default so no placeholder survives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseContext {
    pub user_name: Option<String>,
    pub sun_sign: Option<String>,
    pub moon_sign: Option<String>,
    pub rising_sign: Option<String>,
    #[serde(default)]
    pub transits: Vec<String>,
}

impl ResponseContext {
    fn value_for(&self, token: &str, index: Option<usize>) -> String {
        let pick = |value: &Option<String>, default: &str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        match (token, index) {
            ("userName", None) => pick(&self.user_name, DEFAULT_USER_NAME),
            ("sunSign", None) => pick(&self.sun_sign, DEFAULT_SUN_SIGN),
            ("moonSign", None) => pick(&self.moon_sign, DEFAULT_MOON_SIGN),
            ("risingSign", None) => pick(&self.rising_sign, DEFAULT_RISING_SIGN),
            ("transit", index) => self
                .transits
                .get(index.unwrap_or(0))
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .unwrap_or(DEFAULT_TRANSIT)
                .to_string(),
            _ => UNKNOWN_TOKEN.to_string(),
        }
    }
}

/// Persona → intent → template pool.
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    pools: HashMap<Persona, HashMap<Intent, Vec<String>>>,
    default_persona: Persona,
}

impl TemplateLibrary {
    pub fn builtin() -> Self {
        BUILTIN_LIBRARY.clone()
    }

    pub fn empty(default_persona: Persona) -> Self {
        Self {
            pools: HashMap::new(),
            default_persona,
        }
    }

    /// Parses `{ "Friend": { "sad": ["...", ...] } }`. Labels are strict here;
    /// a typo in a template file is an error, not a silent fallback.
    pub fn from_json(raw: &str) -> LyraResult<Self> {
        let parsed: HashMap<String, HashMap<String, Vec<String>>> = serde_json::from_str(raw)?;
        let mut library = Self::empty(Persona::default());

        for (persona_label, intents) in parsed {
            let persona = Persona::parse(&persona_label)
                .ok_or_else(|| LyraError::UnknownPersona(persona_label.clone()))?;
            for (intent_label, templates) in intents {
                let intent = intent_label.parse::<Intent>()?;
                library.insert(persona, intent, templates);
            }
        }

        Ok(library)
    }

    pub fn insert(&mut self, persona: Persona, intent: Intent, templates: Vec<String>) {
        self.pools.entry(persona).or_default().insert(intent, templates);
    }

    /// Pools from `overrides` replace the matching pools of `self`.
    pub fn merge(mut self, overrides: TemplateLibrary) -> Self {
        for (persona, intents) in overrides.pools {
            for (intent, templates) in intents {
                self.insert(persona, intent, templates);
            }
        }
        self
    }

    pub fn default_persona(&self) -> Persona {
        self.default_persona
    }

    /// Resolution order: (persona, intent), (persona, fallback),
    /// (default persona, intent), (default persona, fallback).
    pub fn pool(&self, persona: Persona, intent: Intent) -> Option<&[String]> {
        let candidates = [
            (persona, intent),
            (persona, Intent::Fallback),
            (self.default_persona, intent),
            (self.default_persona, Intent::Fallback),
        ];

        candidates.iter().find_map(|(persona, intent)| {
            self.pools
                .get(persona)
                .and_then(|intents| intents.get(intent))
                .filter(|templates| !templates.is_empty())
                .map(Vec::as_slice)
        })
    }

    pub fn select_response<R: Rng + ?Sized>(
        &self,
        persona: Persona,
        intent: Intent,
        context: &ResponseContext,
        rng: &mut R,
    ) -> String {
        match self
            .pool(persona, intent)
            .and_then(|templates| templates.choose(rng))
        {
            Some(template) => fill_template(template, context),
            None => LAST_RESORT.to_string(),
        }
    }
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

pub fn fill_template(template: &str, context: &ResponseContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let index = caps.get(2).and_then(|raw| raw.as_str().parse::<usize>().ok());
            context.value_for(&caps[1], index)
        })
        .into_owned()
}

pub fn welcome_message(persona: Persona) -> String {
    format!(
        "Hello, cosmic soul! I'm your {} guide. I'm here to provide you with personalized astrological insights and support. What's on your mind today?",
        persona.label()
    )
}

pub fn limit_reached_message() -> &'static str {
    "You've reached your daily chat limit! Upgrade to Cosmic+ for unlimited conversations with me."
}

type PersonaTemplates = (Persona, &'static [(Intent, [&'static str; 5])]);

const BUILTIN_TEMPLATES: &[PersonaTemplates] = &[
    (
        Persona::Astrologer,
        &[
            (
                Intent::Greeting,
                [
                    "Welcome back, {userName}. Your {sunSign} Sun is glowing today, and {transit[0]} colors the sky. What would you like to explore?",
                    "Greetings, {userName}. With {transit[1]} overhead, it's a fine moment to ask the stars a question.",
                    "Hello, {userName}! Your {risingSign} rising always makes a strong entrance. Where shall we begin?",
                    "The Moon in your chart sits in {moonSign}, {userName}, so I sense you arrive with something on your heart. Tell me.",
                    "Good to see you, {userName}. The planets have been busy: {transit[2]}. Ask me anything.",
                ],
            ),
            (
                Intent::Sad,
                [
                    "Jupiter's influence on your natal chart suggests expansion and growth. This challenge is preparing you for greater abundance.",
                    "Your birth chart reveals strong Pluto aspects, indicating you're going through a profound transformation. Embrace the change.",
                    "The upcoming lunar eclipse will illuminate your path. Your {moonSign} Moon helps you navigate emotional waters.",
                    "This planetary transit is temporary, but the growth it brings is permanent. Your {moonSign} Moon will guide you through.",
                    "Chiron's influence suggests healing through this experience. Your {sunSign} Sun knows how to transform pain into power.",
                ],
            ),
            (
                Intent::Happy,
                [
                    "The stars are aligning in your favor. Your {risingSign} rising gives you powerful magnetism to attract what you need.",
                    "This joy fits your chart, {userName}. Your {sunSign} Sun loves to shine, and {transit[3]} amplifies it.",
                    "Venus smiles on you today. Savor it: your {moonSign} Moon stores happy memories as fuel for later.",
                    "The cosmic winds are shifting in your favor. Your birth chart shows remarkable resilience and adaptability.",
                    "A bright transit indeed. With {transit[0]}, celebrations started now tend to ripple outward.",
                ],
            ),
            (
                Intent::Love,
                [
                    "With your Sun in {sunSign}, this situation reflects your natural leadership abilities. The current planetary alignment suggests transformation is coming.",
                    "Your Moon in {moonSign} indicates deep emotional sensitivity. Trust your intuition during this Mercury retrograde period.",
                    "Venus is blessing your relationship sector. With your {sunSign} energy, communication will be key.",
                    "Your {risingSign} rising shapes how others first fall for you. Right now {transit[1]} asks you to lead with warmth.",
                    "The North Node in your chart indicates this is part of your soul's journey. You're exactly where you need to be.",
                ],
            ),
            (
                Intent::Career,
                [
                    "Mars energy is activating your career sector. Your natural {risingSign} assertiveness will serve you well.",
                    "Saturn's lessons are preparing you for long-term success. Your {sunSign} determination will see you through.",
                    "Your natal Mercury placement suggests clear communication will resolve this situation. Speak your truth with confidence.",
                    "The universe is conspiring in your favor. Your birth chart shows strong intuitive abilities - trust what you feel.",
                    "With {transit[2]} in play, bold moves at work are better planned than rushed. Your {sunSign} Sun rewards patience.",
                ],
            ),
            (
                Intent::Money,
                [
                    "Jupiter governs abundance, and {transit[3]} puts it in conversation with your chart. Plan before you spend.",
                    "Your {sunSign} Sun wants security and a little luxury. Saturn suggests building the first before the second.",
                    "The second house rules resources, {userName}. Right now it favors steady habits over sudden gambles.",
                    "Your {moonSign} Moon ties money to feelings. Notice what you buy when you feel low.",
                    "Venus and Jupiter both touch material comfort this season. Small, consistent choices will compound.",
                ],
            ),
            (
                Intent::Health,
                [
                    "The sixth house speaks to daily routines. With {transit[4]}, gentle consistency beats intensity.",
                    "Your {sunSign} vitality is real, but even the Sun sets. Rest is part of your chart too.",
                    "Your {moonSign} Moon absorbs the moods around you, {userName}. Protect your sleep like a sacred ritual.",
                    "Mars fuels your body's fire. Channel it into movement rather than worry.",
                    "Your {risingSign} rising governs the physical self. Listen to what your body is asking for this week.",
                ],
            ),
            (
                Intent::Question,
                [
                    "A good question, {userName}. Your {sunSign} Sun seeks clarity, and {transit[0]} suggests the answer comes through patience.",
                    "The planets rarely give yes or no. Your {risingSign} rising suggests trusting the first instinct you had.",
                    "Look to your {moonSign} Moon for this one: what does your gut already say?",
                    "Mercury rules questions. With {transit[1]}, gather one more piece of information before deciding.",
                    "Your chart points toward growth either way. Choose the path that lets your {sunSign} nature breathe.",
                ],
            ),
            (
                Intent::Fallback,
                [
                    "Your birth chart is rich with meaning, {userName}. Tell me more so I can read the right part of it.",
                    "With your Sun in {sunSign} and Moon in {moonSign}, there is much to explore. Where should we look first?",
                    "The sky is full of stories today, {transit[0]} among them. Which area of life is calling to you?",
                    "Your {risingSign} rising suggests you already sense the answer. Share a little more and we'll confirm it with the stars.",
                    "Every transit carries a lesson. Tell me what's happening and I'll show you where it sits in your chart.",
                ],
            ),
        ],
    ),
    (
        Persona::Therapist,
        &[
            (
                Intent::Greeting,
                [
                    "Hi {userName}, it's good to hear from you. How are you feeling right now, honestly?",
                    "Hello {userName}. This is a safe space. What would feel helpful to talk about today?",
                    "Welcome, {userName}. Take a breath before we begin. What's present for you?",
                    "Hi there. I'm glad you reached out, {userName}. Where would you like to start?",
                    "Hello again, {userName}. Let's check in: what has today been like for you?",
                ],
            ),
            (
                Intent::Sad,
                [
                    "Your sensitivity is actually a superpower, even when it feels overwhelming. The world needs more people with your depth of feeling.",
                    "I can sense your inner wisdom trying to guide you. Trust that voice within you - it knows the way forward.",
                    "Healing isn't linear, and it's okay to have difficult days. You're exactly where you need to be in your journey.",
                    "Your capacity for growth and transformation is remarkable. I believe in your ability to navigate through this challenging time.",
                    "Remember to be gentle with yourself. You're doing the best you can with the resources you have right now.",
                ],
            ),
            (
                Intent::Happy,
                [
                    "I love hearing this, {userName}. Let yourself really feel it. What made this moment possible?",
                    "That's wonderful. Noticing good moments is a skill, and you're practicing it right now.",
                    "It sounds like something meaningful shifted for you. How does it feel in your body?",
                    "I'm genuinely glad for you, {userName}. Joy deserves as much attention as pain does.",
                    "Celebrating yourself is healthy. What would you like to remember about today?",
                ],
            ),
            (
                Intent::Love,
                [
                    "I hear the pain in your words, and it's completely valid to feel this way. Your emotions are a compass guiding you toward healing.",
                    "What you're experiencing sounds overwhelming. Remember, it's okay to take things one day at a time. You're stronger than you know.",
                    "Your feelings matter deeply. Sometimes the universe puts us through challenges to help us discover our inner strength and resilience.",
                    "I want you to know that you're not alone in this journey. Every step you take toward healing is an act of courage.",
                    "It's beautiful that you're reaching out and sharing your feelings. This shows incredible self-awareness and emotional intelligence.",
                ],
            ),
            (
                Intent::Career,
                [
                    "This feeling you're experiencing is temporary, but the strength you're building is permanent. You're so much more resilient than you realize.",
                    "It's okay to sit with these emotions without trying to fix them immediately. Sometimes healing requires us to feel fully first.",
                    "Your willingness to be vulnerable and honest about your struggles is a sign of incredible emotional maturity and courage.",
                    "I see your light even when you can't see it yourself. You have an innate ability to heal and transform your experiences into wisdom.",
                    "Trust the process of your healing. Every emotion you feel is information, and you're learning to interpret your inner world with such skill.",
                ],
            ),
            (
                Intent::Money,
                [
                    "Money worries can feel heavy, {userName}. What part of this is weighing on you most?",
                    "It's understandable to feel anxious about finances. Let's separate what you can control from what you can't.",
                    "Your worth isn't measured by your bank balance. Still, this stress is real and worth addressing gently.",
                    "Sometimes naming the exact number we fear makes it smaller. Would you like to try that together?",
                    "Financial stress often hides other feelings, like fear of letting people down. Does that resonate?",
                ],
            ),
            (
                Intent::Health,
                [
                    "Your body and mind are closely connected, {userName}. How have you been sleeping lately?",
                    "Exhaustion is a signal, not a failure. What would real rest look like for you this week?",
                    "I'm glad you're paying attention to your wellbeing. Small routines can be very grounding.",
                    "It sounds like you're carrying a lot. If symptoms persist, checking in with a doctor is an act of self-care.",
                    "Be patient with your body. It has been working hard to carry you through everything.",
                ],
            ),
            (
                Intent::Question,
                [
                    "That's an important question, {userName}. What answer are you hoping for, and what answer are you afraid of?",
                    "Let's explore that together. What options have you already considered?",
                    "There may not be a perfect answer, but there can be a kind one. What would you tell a friend in your place?",
                    "Questions like this often come from a deeper need. What do you think that need might be?",
                    "It's okay not to know yet. Sometimes clarity arrives once we slow down and listen inward.",
                ],
            ),
            (
                Intent::Fallback,
                [
                    "Thank you for sharing that, {userName}. Can you tell me a little more about how it makes you feel?",
                    "I'm listening. What feels most important about this for you right now?",
                    "It sounds like there's a lot going on. Let's take it one piece at a time.",
                    "I hear you. What would support look like for you today?",
                    "Whatever you're feeling is welcome here. Where would you like to go from here?",
                ],
            ),
        ],
    ),
    (
        Persona::Friend,
        &[
            (
                Intent::Greeting,
                [
                    "Heyyy {userName}! So good to see you! What's the tea today? ✨",
                    "Hi bestie! Your {sunSign} energy is literally radiating through the screen. What's up?",
                    "Omg hi {userName}! I was just thinking about you. Spill everything!",
                    "Hey hey! Did you see {transit[0]} is happening? Anyway, how ARE you?",
                    "Hiii! Ready for some cosmic gossip, {userName}? 🌙",
                ],
            ),
            (
                Intent::Sad,
                [
                    "You know what? I think this is just the universe clearing out space for all the good stuff that's about to enter your life!",
                    "Honestly, every time you've been through something tough before, you've come out even more awesome. This time will be no different!",
                    "I believe in you SO much! You have this incredible ability to turn any situation around. It's like your superpower!",
                    "Let's be real - you're a total badass! This challenge is just another opportunity for you to show how incredible you are.",
                    "I'm literally sending you all the good vibes right now! You're going to look back on this moment and be so proud of how you handled it.",
                ],
            ),
            (
                Intent::Happy,
                [
                    "YES {userName}!! I'm so happy for you! This calls for a celebration! 🎉",
                    "Okay this is the best news ever! Your {sunSign} Sun is totally showing off today ☀️",
                    "Stop it, I love this for you! Tell me literally everything.",
                    "See?! I told you good things were coming! The universe said you deserve it ✨",
                    "Ahh this made my whole day! {transit[3]} has nothing on your glow right now!",
                ],
            ),
            (
                Intent::Love,
                [
                    "Hey, I totally get it! Life can be such a rollercoaster sometimes. But you know what? You've got this! ✨",
                    "Aw, sending you the biggest cosmic hug right now! Things might seem tough, but I have a feeling something amazing is coming your way.",
                    "Girl, you're literally one of the strongest people I know! This is just a temporary cloud - your sunshine is coming! ☀️",
                    "Okay, first of all, you're amazing and don't let anyone tell you otherwise! Let's figure this out together, yeah?",
                    "I'm here for you no matter what! Sometimes the universe has weird ways of setting us up for something incredible.",
                ],
            ),
            (
                Intent::Career,
                [
                    "Bestie, you've been through storms before and look how you bloomed! This is just another chapter in your amazing story.",
                    "I'm so proud of you for reaching out and talking about this. That takes real courage, and you've got it in spades!",
                    "You know what I love about you? You never give up. Even when things get tough, you keep pushing forward. That's legendary behavior!",
                    "I have such a good feeling about your future! The universe is totally setting you up for something magical - I can feel it!",
                    "Remember when you thought you wouldn't get through that last thing? Look at you now! You're absolutely unstoppable, my cosmic friend!",
                ],
            ),
            (
                Intent::Money,
                [
                    "Ugh, money stuff is the worst. But {userName}, you're smart and you'll figure it out, I promise!",
                    "Okay, budget date? We make a plan, get snacks, and feel like responsible adults together 💸",
                    "Your {sunSign} brain is SO good at this when you focus. Let's break it down!",
                    "Honestly {transit[2]} makes everyone weird about money right now. You're not alone!",
                    "Abundance is coming your way, I can feel it. In the meantime, treat yourself to something tiny ✨",
                ],
            ),
            (
                Intent::Health,
                [
                    "Babe, please rest! You can't pour from an empty cup ☕",
                    "Hydrate, nap, repeat. Doctor's orders. Well, best friend's orders, {userName} 💧",
                    "Your {moonSign} Moon needs some cozy time. Blanket, tea, your comfort show. Go!",
                    "If you're not feeling okay, please get checked out. I need you at your best!",
                    "Gentle walk and some sunshine? Your body will thank you, promise ☀️",
                ],
            ),
            (
                Intent::Question,
                [
                    "Ooh good question! Honestly? Trust your gut, {userName}. It's never steered you wrong.",
                    "Hmm, let me think... Your {risingSign} rising says go for it! 😄",
                    "Okay real talk: what would future-you want you to do?",
                    "I say follow your heart! But maybe sleep on it first, {transit[1]} is being chaotic rn.",
                    "Not gonna lie, I think you already know the answer, bestie ✨",
                ],
            ),
            (
                Intent::Fallback,
                [
                    "Tell me more, {userName}! I'm all ears 👂",
                    "Wait, I need the full story. Go on!",
                    "Honestly whatever it is, I'm on your side. What's happening?",
                    "Okay I'm listening! Your {sunSign} self always has the most interesting stuff going on.",
                    "Mmhm, and then what? Don't leave me hanging! ✨",
                ],
            ),
        ],
    ),
];
